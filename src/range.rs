//! Range iteration
//!
//! [`RangeIter`] merges a lazy store cursor with a transaction's pending
//! writes. On equal keys the pending write wins: a pending delete hides the
//! key and a pending set substitutes its value. The iterator owns everything
//! it needs, so the transaction it came from may be mutated while it runs.

use std::cmp::Ordering;
use std::iter::Peekable;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use bytes::Bytes;

use crate::context::Context;
use crate::error::Result;
use crate::mvcc::{Direction, ReadPin, StoreCursor};
use crate::transaction::PendingOp;
use crate::value::ValueReader;

/// One key/value pair produced by a range scan
#[derive(Debug, Clone)]
pub struct RangeEntry {
    pub key: Bytes,
    pub value: ValueReader,
}

impl RangeEntry {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// The full value as owned bytes
    pub fn value_bytes(&self) -> Bytes {
        self.value.clone().into_bytes()
    }
}

/// Ordered, finite sequence of live entries in `[begin, end)`
///
/// Yields `Err` once if its context is cancelled mid-scan and nothing after.
pub struct RangeIter {
    ctx: Context,
    committed: Peekable<StoreCursor>,
    pending: Peekable<std::vec::IntoIter<(Bytes, PendingOp)>>,
    direction: Direction,
    closed: Option<Arc<AtomicBool>>,

    /// Keeps the versions behind `committed` from being pruned
    _pin: Option<Arc<ReadPin>>,
    done: bool,
}

enum Source {
    Committed,
    Pending,
    Both,
}

impl RangeIter {
    /// `pending` must already be restricted to the range and sorted in
    /// iteration order.
    pub(crate) fn new(
        ctx: Context,
        committed: StoreCursor,
        pending: Vec<(Bytes, PendingOp)>,
        direction: Direction,
        closed: Option<Arc<AtomicBool>>,
        pin: Option<Arc<ReadPin>>,
    ) -> Self {
        Self {
            ctx,
            committed: committed.peekable(),
            pending: pending.into_iter().peekable(),
            direction,
            closed,
            _pin: pin,
            done: false,
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
            .as_ref()
            .map_or(false, |flag| flag.load(AtomicOrdering::Acquire))
    }

    fn next_source(&mut self) -> Option<Source> {
        let order = match (self.committed.peek(), self.pending.peek()) {
            (None, None) => return None,
            (Some(_), None) => return Some(Source::Committed),
            (None, Some(_)) => return Some(Source::Pending),
            (Some((committed, _)), Some((pending, _))) => committed.cmp(pending),
        };
        let order = match self.direction {
            Direction::Ascending => order,
            Direction::Descending => order.reverse(),
        };
        Some(match order {
            Ordering::Less => Source::Committed,
            Ordering::Greater => Source::Pending,
            Ordering::Equal => Source::Both,
        })
    }
}

impl Iterator for RangeIter {
    type Item = Result<RangeEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if let Err(e) = self.ctx.checkpoint() {
            self.done = true;
            return Some(Err(e));
        }

        loop {
            if self.is_closed() {
                self.done = true;
                return None;
            }

            let source = match self.next_source() {
                Some(source) => source,
                None => {
                    self.done = true;
                    return None;
                }
            };

            if let Source::Committed = source {
                let (key, value) = self.committed.next()?;
                return Some(Ok(RangeEntry {
                    key,
                    value: ValueReader::new(value),
                }));
            }

            if let Source::Both = source {
                self.committed.next();
            }
            match self.pending.next()? {
                (key, PendingOp::Set(value)) => {
                    return Some(Ok(RangeEntry {
                        key,
                        value: ValueReader::new(value),
                    }))
                }
                (_, PendingOp::Delete) => continue,
            }
        }
    }
}

impl std::fmt::Debug for RangeIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeIter")
            .field("direction", &self.direction)
            .field("done", &self.done)
            .finish()
    }
}
