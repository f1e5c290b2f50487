//! Sequence allocator
//!
//! Hands out commit sequences and tracks the visible read point.
//!
//! Commits on disjoint keys run concurrently, so sequence 6 may finish
//! publishing before sequence 5. The read point only advances over
//! sequences whose records are fully published, which is what makes every
//! commit batch appear atomically to new transactions and snapshots.
//! A committer waits in [`SequenceAllocator::wait_visible`] until the read
//! point covers its own sequence, so its write is visible to every reader
//! that starts after `commit` returns.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex};

use super::Seq;

/// Process-wide sequence counter owned by one database
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    /// Highest sequence handed out
    allocated: CachePadded<AtomicU64>,

    /// Highest sequence at or below which every commit is published
    visible: CachePadded<AtomicU64>,

    /// Allocated but not yet finished
    in_flight: Mutex<BTreeSet<Seq>>,

    /// Signalled whenever the read point advances
    advanced: Condvar,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume after recovery: the next allocation is `seq + 1` and
    /// everything up to `seq` is visible
    pub fn restore(&self, seq: Seq) {
        let in_flight = self.in_flight.lock();
        debug_assert!(in_flight.is_empty());
        self.allocated.store(seq, Ordering::SeqCst);
        self.visible.store(seq, Ordering::Release);
    }

    /// Read timestamp for a new transaction or snapshot (lock-free)
    #[inline]
    pub fn read_point(&self) -> Seq {
        self.visible.load(Ordering::Acquire)
    }

    /// Allocate the next commit sequence and mark it in flight
    pub fn begin_commit(&self) -> Seq {
        let mut in_flight = self.in_flight.lock();
        let seq = self.allocated.fetch_add(1, Ordering::SeqCst) + 1;
        in_flight.insert(seq);
        seq
    }

    /// Mark `seq` finished (published or abandoned) and advance the read point
    pub fn finish_commit(&self, seq: Seq) {
        let mut in_flight = self.in_flight.lock();
        in_flight.remove(&seq);
        let point = match in_flight.first() {
            Some(&oldest) => oldest - 1,
            None => self.allocated.load(Ordering::SeqCst),
        };
        if self.visible.fetch_max(point, Ordering::AcqRel) < point {
            self.advanced.notify_all();
        }
    }

    /// Block until the read point reaches `seq`
    ///
    /// Only waits on commits allocated before `seq`, which are already past
    /// validation and always finish.
    pub fn wait_visible(&self, seq: Seq) {
        let mut in_flight = self.in_flight.lock();
        while self.visible.load(Ordering::Acquire) < seq {
            self.advanced.wait(&mut in_flight);
        }
    }

    /// Highest sequence handed out so far
    pub fn last_allocated(&self) -> Seq {
        self.allocated.load(Ordering::SeqCst)
    }
}
