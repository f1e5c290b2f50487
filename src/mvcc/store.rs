//! Versioned store
//!
//! Ordered index of version chains with point reads and lazy range scans.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use super::{Direction, Payload, Seq, Version, Visible};

/// Per-key history, sorted by strictly increasing commit sequence
type VersionChain = Vec<Version>;

/// Newest version with `commit_seq <= seq`
fn resolve(chain: &VersionChain, seq: Seq) -> Option<&Version> {
    let idx = chain.partition_point(|v| v.commit_seq() <= seq);
    idx.checked_sub(1).map(|i| &chain[i])
}

/// Drop versions shadowed at `horizon`; returns how many were removed
///
/// The newest version at or below `horizon` and everything after it stay.
fn prune_chain(chain: &mut VersionChain, horizon: Seq) -> usize {
    let keep_from = chain
        .partition_point(|v| v.commit_seq() <= horizon)
        .saturating_sub(1);
    chain.drain(..keep_from);
    keep_from
}

/// Holds every committed version of every key
///
/// ## Concurrency:
/// - `index`: RwLock, readers share it, `publish` takes it exclusively for
///   the duration of one batch append
/// - `versions`: atomic counter (lock-free)
/// - Chains grow at the tail; pruning trims the head below a horizon that
///   no reader can resolve at
#[derive(Debug, Default)]
pub struct VersionedStore {
    index: RwLock<BTreeMap<Bytes, VersionChain>>,
    versions: AtomicUsize,
}

impl VersionedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `key` as of `seq`
    pub fn read(&self, key: &[u8], seq: Seq) -> Visible {
        let index = self.index.read();
        match index.get(key).and_then(|chain| resolve(chain, seq)) {
            Some(version) => match version.payload() {
                Payload::Value(v) => Visible::Value(v.clone()),
                Payload::Tombstone => Visible::Tombstone,
            },
            None => Visible::Absent,
        }
    }

    /// Commit sequence of the newest record for `key`, if any
    pub fn latest_seq(&self, key: &[u8]) -> Option<Seq> {
        self.index
            .read()
            .get(key)
            .and_then(|chain| chain.last())
            .map(Version::commit_seq)
    }

    /// Append one record per batch entry, all stamped `commit_seq`, then
    /// prune each touched chain down to what readers at `horizon` or later
    /// can still see
    ///
    /// Callers guarantee `commit_seq` is greater than every sequence already
    /// present for the batch's keys (they hold the keys' commit locks).
    pub fn publish<'a, I>(&self, batch: I, commit_seq: Seq, horizon: Seq)
    where
        I: IntoIterator<Item = (&'a Bytes, &'a Payload)>,
    {
        let mut index = self.index.write();
        let mut appended = 0;
        let mut pruned = 0;
        for (key, payload) in batch {
            let chain = index.entry(key.clone()).or_default();
            debug_assert!(chain.last().map_or(true, |v| v.commit_seq() < commit_seq));
            chain.push(Version::new(commit_seq, payload.clone()));
            appended += 1;
            pruned += prune_chain(chain, horizon);
        }
        self.versions.fetch_add(appended, Ordering::Relaxed);
        self.versions.fetch_sub(pruned, Ordering::Relaxed);
    }

    /// Prune every chain at `horizon`
    ///
    /// A key whose only remaining record is a tombstone at or below
    /// `horizon` is removed entirely. Returns the number of records dropped.
    pub fn prune(&self, horizon: Seq) -> usize {
        let mut index = self.index.write();
        let mut pruned = 0;
        index.retain(|_, chain| {
            pruned += prune_chain(chain, horizon);
            match chain.as_slice() {
                [only] if only.commit_seq() <= horizon && matches!(only.payload(), Payload::Tombstone) => {
                    pruned += 1;
                    false
                }
                _ => true,
            }
        });
        self.versions.fetch_sub(pruned, Ordering::Relaxed);
        pruned
    }

    /// Lazy cursor over live values in `[lower, upper)` as of `seq`
    pub fn scan(
        self: &Arc<Self>,
        lower: Bound<Bytes>,
        upper: Bound<Bytes>,
        seq: Seq,
        direction: Direction,
        batch_size: usize,
    ) -> StoreCursor {
        StoreCursor {
            store: Arc::clone(self),
            seq,
            direction,
            lower,
            upper,
            buffer: VecDeque::new(),
            batch_size: batch_size.max(1),
            exhausted: false,
        }
    }

    /// Number of keys with at least one record (tombstoned keys included)
    pub fn key_count(&self) -> usize {
        self.index.read().len()
    }

    /// Total number of records across all chains
    pub fn version_count(&self) -> usize {
        self.versions.load(Ordering::Relaxed)
    }
}

/// Lazily refilled cursor over a store range
///
/// Each refill takes the read lock once, examines at most `batch_size`
/// keys, and records the last key examined so the next refill resumes
/// strictly after it. No lock is held while the caller consumes items.
pub struct StoreCursor {
    store: Arc<VersionedStore>,
    seq: Seq,
    direction: Direction,
    lower: Bound<Bytes>,
    upper: Bound<Bytes>,
    buffer: VecDeque<(Bytes, Bytes)>,
    batch_size: usize,
    exhausted: bool,
}

impl StoreCursor {
    fn bounds_are_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }

    fn refill(&mut self) {
        if self.bounds_are_empty() {
            self.exhausted = true;
            return;
        }

        let seq = self.seq;
        let mut examined = 0;
        let mut last_key = None;

        {
            let index = self.store.index.read();
            let range = index.range((self.lower.clone(), self.upper.clone()));
            let chains: Box<dyn Iterator<Item = (&Bytes, &VersionChain)>> = match self.direction {
                Direction::Ascending => Box::new(range),
                Direction::Descending => Box::new(range.rev()),
            };

            for (key, chain) in chains {
                examined += 1;
                if let Some(Payload::Value(value)) = resolve(chain, seq).map(Version::payload) {
                    self.buffer.push_back((key.clone(), value.clone()));
                }
                if examined == self.batch_size {
                    last_key = Some(key.clone());
                    break;
                }
            }
        }

        match last_key {
            Some(key) => match self.direction {
                Direction::Ascending => self.lower = Bound::Excluded(key),
                Direction::Descending => self.upper = Bound::Excluded(key),
            },
            None => self.exhausted = true,
        }
    }
}

impl Iterator for StoreCursor {
    type Item = (Bytes, Bytes);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(entry);
            }
            if self.exhausted {
                return None;
            }
            self.refill();
        }
    }
}
