//! MVCC Module
//!
//! Multi-version storage shared by every transaction and snapshot.
//!
//! ## Responsibilities
//! - Keep, per key, the chronology of committed values and tombstones
//! - Answer "value of key K as of sequence S" and ordered scans as of S
//! - Hand out commit sequences and the visible read point
//! - Serialize commits that touch the same keys (striped locks)
//! - Track active readers and prune versions none of them can see
//!
//! ## Data Structure Choice
//! `BTreeMap<Bytes, Vec<Version>>` behind a `parking_lot::RwLock`:
//! - Ordered keys (required for range scans)
//! - Chains are sorted by commit sequence, so point reads are a binary
//!   search; pruning only ever removes a chain's oldest entries
//! - Readers hold the lock only for bounded batches, never across items

mod locks;
mod readers;
mod sequence;
mod store;

pub use locks::{KeyLockGuard, KeyLocks};
pub use readers::{ReadPin, ReaderRegistry};
pub use sequence::SequenceAllocator;
pub use store::{StoreCursor, VersionedStore};

use bytes::Bytes;

/// Commit sequence number
pub type Seq = u64;

/// What a committed record (or a pending overlay entry) holds for its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// A live value, possibly zero-length
    Value(Bytes),

    /// The key was deleted
    Tombstone,
}

/// One immutable entry in a key's version chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    commit_seq: Seq,
    payload: Payload,
}

impl Version {
    pub fn new(commit_seq: Seq, payload: Payload) -> Self {
        Self { commit_seq, payload }
    }

    pub fn commit_seq(&self) -> Seq {
        self.commit_seq
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }
}

/// Result of resolving a key at a sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Visible {
    Value(Bytes),
    Tombstone,
    Absent,
}

/// Iteration order of a range scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}
