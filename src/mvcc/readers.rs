//! Active reader registry
//!
//! Every transaction and snapshot pins the sequence it reads at. The oldest
//! pin is the pruning horizon: versions shadowed at or below it can never be
//! resolved again and may be dropped from their chains.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{SequenceAllocator, Seq};

/// Reference counts of pinned read sequences
#[derive(Debug, Default)]
pub struct ReaderRegistry {
    active: Mutex<BTreeMap<Seq, usize>>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin the current read point
    ///
    /// The read point is sampled under the registry lock, so a concurrent
    /// [`horizon`](Self::horizon) either sees this pin or returns a
    /// sequence no newer than the one pinned.
    pub fn pin(self: &Arc<Self>, sequence: &SequenceAllocator) -> ReadPin {
        let mut active = self.active.lock();
        let seq = sequence.read_point();
        *active.entry(seq).or_insert(0) += 1;
        ReadPin {
            registry: Arc::clone(self),
            seq,
        }
    }

    /// Oldest sequence any current or future reader can resolve at
    pub fn horizon(&self, sequence: &SequenceAllocator) -> Seq {
        let active = self.active.lock();
        match active.keys().next() {
            Some(&oldest) => oldest,
            None => sequence.read_point(),
        }
    }

    /// Number of live pins
    pub fn active_count(&self) -> usize {
        self.active.lock().values().sum()
    }

    fn release(&self, seq: Seq) {
        let mut active = self.active.lock();
        if let Some(count) = active.get_mut(&seq) {
            *count -= 1;
            if *count == 0 {
                active.remove(&seq);
            }
        }
    }
}

/// A registered read sequence, released on drop
#[derive(Debug)]
pub struct ReadPin {
    registry: Arc<ReaderRegistry>,
    seq: Seq,
}

impl ReadPin {
    pub fn seq(&self) -> Seq {
        self.seq
    }
}

impl Drop for ReadPin {
    fn drop(&mut self) {
        self.registry.release(self.seq);
    }
}
