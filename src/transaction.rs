//! Transactions
//!
//! A transaction reads the store as of its start sequence, buffers writes in
//! a private overlay, and publishes the overlay atomically at commit if no
//! key it wrote was committed by someone else in the meantime.

use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::context::Context;
use crate::database::{KvReader, KvTransaction};
use crate::engine::Engine;
use crate::error::{Result, SnapError};
use crate::key::{in_range, to_bounds, validate_key, validate_range};
use crate::mvcc::{Direction, Payload, ReadPin, Seq, Visible};
use crate::range::RangeIter;
use crate::value::{read_value, ValueReader};

/// Lifecycle of a transaction
///
/// `Committed` and `RolledBack` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// A buffered write, not yet visible outside its transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingOp {
    Set(Bytes),
    Delete,
}

impl PendingOp {
    pub(crate) fn to_payload(&self) -> Payload {
        match self {
            PendingOp::Set(value) => Payload::Value(value.clone()),
            PendingOp::Delete => Payload::Tombstone,
        }
    }
}

/// Read-write transaction
///
/// Dropping an active transaction rolls it back.
pub struct Transaction {
    engine: Arc<Engine>,
    start_seq: Seq,

    /// Held while active; shared with iterators so their versions survive
    pin: Option<Arc<ReadPin>>,
    overlay: BTreeMap<Bytes, PendingOp>,
    state: TransactionState,
}

impl Transaction {
    pub(crate) fn begin(engine: Arc<Engine>) -> Self {
        let pin = engine.pin_read_point();
        let start_seq = pin.seq();
        debug!(start_seq, "transaction started");
        Self {
            engine,
            start_seq,
            pin: Some(Arc::new(pin)),
            overlay: BTreeMap::new(),
            state: TransactionState::Active,
        }
    }

    /// Sequence this transaction reads committed data at
    pub fn start_seq(&self) -> Seq {
        self.start_seq
    }

    fn ensure_active(&self) -> Result<()> {
        match self.state {
            TransactionState::Active => Ok(()),
            _ => Err(SnapError::Closed),
        }
    }

    fn finish(&mut self, state: TransactionState) {
        self.overlay.clear();
        self.pin = None;
        self.state = state;
    }

    fn range(&self, ctx: &Context, begin: &[u8], end: &[u8], direction: Direction) -> Result<RangeIter> {
        ctx.checkpoint()?;
        self.ensure_active()?;
        validate_range(begin, end)?;

        let (lower, upper) = to_bounds(begin, end);
        let cursor = self.engine.scan(lower, upper, self.start_seq, direction);

        let mut pending: Vec<(Bytes, PendingOp)> = self
            .overlay
            .iter()
            .filter(|(key, _)| in_range(key, begin, end))
            .map(|(key, op)| (key.clone(), op.clone()))
            .collect();
        if direction == Direction::Descending {
            pending.reverse();
        }

        Ok(RangeIter::new(ctx.clone(), cursor, pending, direction, None, self.pin.clone()))
    }
}

impl KvReader for Transaction {
    fn get<K: AsRef<[u8]>>(&self, ctx: &Context, key: K) -> Result<ValueReader> {
        let key = key.as_ref();
        ctx.checkpoint()?;
        self.ensure_active()?;
        validate_key(key)?;

        match self.overlay.get(key) {
            Some(PendingOp::Set(value)) => return Ok(ValueReader::new(value.clone())),
            Some(PendingOp::Delete) => return Err(SnapError::NotFound),
            None => {}
        }

        match self.engine.read(key, self.start_seq) {
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

impl KvTransaction for Transaction {
    fn set<K: AsRef<[u8]>, R: Read>(&mut self, ctx: &Context, key: K, value: R) -> Result<()> {
        let key = key.as_ref();
        ctx.checkpoint()?;
        self.ensure_active()?;
        validate_key(key)?;

        let config = self.engine.config();
        let value = read_value(ctx, value, config.max_value_size, config.value_chunk_size)?;
        self.overlay
            .insert(Bytes::copy_from_slice(key), PendingOp::Set(value));
        Ok(())
    }

    fn delete<K: AsRef<[u8]>>(&mut self, ctx: &Context, key: K) -> Result<()> {
        let key = key.as_ref();
        ctx.checkpoint()?;
        self.ensure_active()?;
        validate_key(key)?;

        self.overlay.insert(Bytes::copy_from_slice(key), PendingOp::Delete);
        Ok(())
    }

    fn commit(&mut self, ctx: &Context) -> Result<()> {
        if self.state != TransactionState::Active {
            return Ok(());
        }
        ctx.checkpoint()?;

        match self.engine.commit(ctx, self.start_seq, &self.overlay) {
            Ok(_) => {
                self.finish(TransactionState::Committed);
                Ok(())
            }
            // Nothing was validated or written; the caller may retry
            Err(e @ (SnapError::Cancelled | SnapError::DeadlineExceeded)) => Err(e),
            Err(e) => {
                self.finish(TransactionState::RolledBack);
                Err(e)
            }
        }
    }

    fn rollback(&mut self, _ctx: &Context) -> Result<()> {
        if self.state != TransactionState::Active {
            return Ok(());
        }
        self.finish(TransactionState::RolledBack);
        self.engine.record_rollback();
        debug!(start_seq = self.start_seq, "transaction rolled back");
        Ok(())
    }

    fn state(&self) -> TransactionState {
        self.state
    }

    fn pending_operations(&self) -> usize {
        self.overlay.len()
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.state == TransactionState::Active {
            self.finish(TransactionState::RolledBack);
            self.engine.record_rollback();
        }
    }
}

impl std::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("start_seq", &self.start_seq)
            .field("pending", &self.overlay.len())
            .field("state", &self.state)
            .finish()
    }
}
