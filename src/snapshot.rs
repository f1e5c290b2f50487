//! Read-only snapshots
//!
//! A snapshot is a lens onto store history frozen at the read point current
//! when it was created. It owns no data, so repeated reads always agree.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::context::Context;
use crate::database::{KvReader, KvSnapshot};
use crate::engine::Engine;
use crate::error::{Result, SnapError};
use crate::key::{to_bounds, validate_key, validate_range};
use crate::mvcc::{Direction, ReadPin, Seq, Visible};
use crate::range::RangeIter;
use crate::value::ValueReader;

/// Consistent read-only view
///
/// Dropping a snapshot discards it. Iterators created from a snapshot stop
/// yielding once it is discarded.
pub struct Snapshot {
    engine: Arc<Engine>,
    read_seq: Seq,

    /// Shared with every iterator handed out
    discarded: Arc<AtomicBool>,

    /// Released on discard
    pin: Option<Arc<ReadPin>>,
}

impl Snapshot {
    pub(crate) fn capture(engine: Arc<Engine>) -> Self {
        let pin = engine.pin_read_point();
        let read_seq = pin.seq();
        trace!(read_seq, "snapshot created");
        Self {
            engine,
            read_seq,
            discarded: Arc::new(AtomicBool::new(false)),
            pin: Some(Arc::new(pin)),
        }
    }

    pub fn read_seq(&self) -> Seq {
        self.read_seq
    }

    pub fn is_discarded(&self) -> bool {
        self.discarded.load(Ordering::Acquire)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_discarded() {
            Err(SnapError::Closed)
        } else {
            Ok(())
        }
    }

    fn range(&self, ctx: &Context, begin: &[u8], end: &[u8], direction: Direction) -> Result<RangeIter> {
        ctx.checkpoint()?;
        self.ensure_active()?;
        validate_range(begin, end)?;

        let (lower, upper) = to_bounds(begin, end);
        let cursor = self.engine.scan(lower, upper, self.read_seq, direction);
        Ok(RangeIter::new(
            ctx.clone(),
            cursor,
            Vec::new(),
            direction,
            Some(Arc::clone(&self.discarded)),
            self.pin.clone(),
        ))
    }
}

impl KvReader for Snapshot {
    fn get<K: AsRef<[u8]>>(&self, ctx: &Context, key: K) -> Result<ValueReader> {
        let key = key.as_ref();
        ctx.checkpoint()?;
        self.ensure_active()?;
        validate_key(key)?;

        match self.engine.read(key, self.read_seq) {
            Visible::Value(value) => Ok(ValueReader::new(value)),
            Visible::Tombstone | Visible::Absent => Err(SnapError::NotFound),
        }
    }

    fn ascend<B: AsRef<[u8]>, E: AsRef<[u8]>>(&self, ctx: &Context, begin: B, end: E) -> Result<RangeIter> {
        self.range(ctx, begin.as_ref(), end.as_ref(), Direction::Ascending)
    }

    fn descend<B: AsRef<[u8]>, E: AsRef<[u8]>>(&self, ctx: &Context, begin: B, end: E) -> Result<RangeIter> {
        self.range(ctx, begin.as_ref(), end.as_ref(), Direction::Descending)
    }
}

impl KvSnapshot for Snapshot {
    fn discard(&mut self, _ctx: &Context) -> Result<()> {
        self.discarded.store(true, Ordering::Release);
        self.pin = None;
        Ok(())
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.discarded.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("read_seq", &self.read_seq)
            .field("discarded", &self.is_discarded())
            .finish()
    }
}
