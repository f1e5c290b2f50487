//! Engine Module
//!
//! The shared core every transaction and snapshot of one database points at.
//!
//! ## Responsibilities
//! - Own the versioned store, sequence allocator, and commit locks
//! - Run the optimistic commit protocol (validate, log, publish)
//! - Track active readers and prune versions none of them can see
//! - Replay and compact the WAL on startup (durable backend)
//! - Keep operation counters for `stats()`

use std::collections::BTreeMap;
use std::fs;
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::{Config, WalSyncStrategy};
use crate::context::Context;
use crate::error::{Result, SnapError};
use crate::mvcc::{
    Direction, KeyLocks, Payload, ReadPin, ReaderRegistry, SequenceAllocator, Seq, StoreCursor,
    VersionedStore, Visible,
};
use crate::transaction::PendingOp;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// Point-in-time counters for one database
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Highest commit sequence visible to new transactions and snapshots
    pub committed_seq: u64,

    /// Keys with at least one record (deleted keys included)
    pub keys: usize,

    /// Records across all version chains
    pub versions: usize,

    /// Successful non-empty commits
    pub commits: u64,

    /// Commits rejected by validation
    pub conflicts: u64,

    /// Explicit or implicit rollbacks of active transactions
    pub rollbacks: u64,
}

/// Shared MVCC core
///
/// ## Concurrency Model: optimistic, striped commits
///
/// - **Reads** (transaction and snapshot get/scan): never take commit locks;
///   they resolve against the store at a fixed sequence
///
/// - **Commits**: lock the stripes of the overlay's keys, then
///   validate → allocate sequence → WAL → publish → finish sequence.
///   Commits with disjoint stripes run in parallel; the read point only
///   moves past a sequence once every earlier sequence has published, and
///   `commit` returns only once the read point covers its own sequence
///
/// - **Pruning**: each publish trims the touched chains below the oldest
///   pinned read sequence; `collect_garbage` sweeps every chain
///
/// - **WAL**: one `Mutex<WalWriter>`, held only for the append itself
pub struct Engine {
    config: Config,
    store: Arc<VersionedStore>,
    sequence: SequenceAllocator,
    readers: Arc<ReaderRegistry>,
    locks: KeyLocks,

    /// Commit log (durable backend only)
    wal: Option<Mutex<WalWriter>>,

    commits: AtomicU64,
    conflicts: AtomicU64,
    rollbacks: AtomicU64,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const COMPACT_FILENAME: &'static str = "wal.log.compact";

    fn with_wal(config: Config, wal: Option<WalWriter>) -> Self {
        let locks = KeyLocks::new(config.lock_stripes);
        Self {
            config,
            store: Arc::new(VersionedStore::new()),
            sequence: SequenceAllocator::new(),
            readers: Arc::new(ReaderRegistry::new()),
            locks,
            wal: wal.map(Mutex::new),
            commits: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
        }
    }

    /// Create an engine that keeps everything in memory
    pub fn in_memory(config: Config) -> Result<Self> {
        config.validate()?;
        debug!(lock_stripes = config.lock_stripes, "created in-memory engine");
        Ok(Self::with_wal(config, None))
    }

    /// In-memory engine with the default configuration
    pub(crate) fn in_memory_default() -> Self {
        Self::with_wal(Config::default(), None)
    }

    /// Open or create a WAL-backed engine under `config.data_dir`
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Recover the WAL, truncating any partial or corrupt tail
    /// 3. Replay every batch under its original commit sequence
    /// 4. Rewrite the WAL as a single batch of live values
    /// 5. Reopen the WAL for appends
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let (entries, recovery) = WalRecovery::recover(&wal_path)?;
        if recovery.entries_corrupted > 0 {
            warn!(
                corrupted = recovery.entries_corrupted,
                last_lsn = recovery.last_lsn,
                "WAL contained corrupt entries; later commits were discarded"
            );
        }

        // Replay into a WAL-less engine, then attach the log
        let mut engine = Self::with_wal(config, None);
        let mut max_seq = 0;
        for entry in entries {
            let batch: Vec<(Bytes, Payload)> = entry
                .operations
                .into_iter()
                .map(|op| match op {
                    Operation::Put { key, value } => (Bytes::from(key), Payload::Value(Bytes::from(value))),
                    Operation::Delete { key } => (Bytes::from(key), Payload::Tombstone),
                })
                .collect();
            // No readers exist yet, so only the newest record per key is kept
            engine
                .store
                .publish(batch.iter().map(|(k, p)| (k, p)), entry.commit_seq, entry.commit_seq);
            max_seq = max_seq.max(entry.commit_seq);
        }
        engine.sequence.restore(max_seq);

        if max_seq > 0 {
            engine.compact_wal(&wal_path, max_seq)?;
        }

        let writer = WalWriter::open(&wal_path, engine.config.wal_sync_strategy)?;
        engine.wal = Some(Mutex::new(writer));

        info!(
            data_dir = %engine.config.data_dir.display(),
            recovered = recovery.entries_recovered,
            committed_seq = max_seq,
            keys = engine.store.key_count(),
            "opened durable engine"
        );
        Ok(engine)
    }

    /// Replace the WAL with one entry holding every live value at `seq`
    fn compact_wal(&self, wal_path: &Path, seq: Seq) -> Result<()> {
        let compact_path: PathBuf = self.config.data_dir.join(Self::COMPACT_FILENAME);
        if compact_path.exists() {
            fs::remove_file(&compact_path)?;
        }

        let operations: Vec<Operation> = self
            .store
            .scan(
                Bound::Unbounded,
                Bound::Unbounded,
                seq,
                Direction::Ascending,
                self.config.scan_batch_size,
            )
            .map(|(key, value)| Operation::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            })
            .collect();
        let live = operations.len();

        {
            let mut writer = WalWriter::open(&compact_path, WalSyncStrategy::EveryWrite)?;
            writer.append(seq, operations)?;
        }
        fs::rename(&compact_path, wal_path)?;

        debug!(live_keys = live, seq, "compacted WAL");
        Ok(())
    }

    // =========================================================================
    // Read Path
    // =========================================================================

    /// Sequence new transactions and snapshots read at
    pub fn read_point(&self) -> Seq {
        self.sequence.read_point()
    }

    /// Register a reader at the current read point
    ///
    /// Versions that reader can resolve survive pruning until the pin drops.
    pub(crate) fn pin_read_point(&self) -> ReadPin {
        self.readers.pin(&self.sequence)
    }

    pub(crate) fn read(&self, key: &[u8], seq: Seq) -> Visible {
        self.store.read(key, seq)
    }

    pub(crate) fn scan(
        &self,
        lower: Bound<Bytes>,
        upper: Bound<Bytes>,
        seq: Seq,
        direction: Direction,
    ) -> StoreCursor {
        self.store
            .scan(lower, upper, seq, direction, self.config.scan_batch_size)
    }

    // =========================================================================
    // Commit Path
    // =========================================================================

    /// Validate and publish an overlay read at `start_seq`
    ///
    /// Returns the commit sequence, or `None` for an empty overlay.
    /// `Conflict` means a key of the overlay received a record after
    /// `start_seq`; `Cancelled`/`DeadlineExceeded` mean nothing was checked
    /// or written. Any error leaves the store untouched.
    pub(crate) fn commit(
        &self,
        ctx: &Context,
        start_seq: Seq,
        overlay: &BTreeMap<Bytes, PendingOp>,
    ) -> Result<Option<Seq>> {
        if overlay.is_empty() {
            return Ok(None);
        }

        let guard = self
            .locks
            .lock_keys(ctx, overlay.keys().map(|k| k.as_ref()))?;
        ctx.checkpoint()?;

        for key in overlay.keys() {
            if let Some(latest) = self.store.latest_seq(key) {
                if latest > start_seq {
                    self.conflicts.fetch_add(1, Ordering::Relaxed);
                    debug!(start_seq, latest, "commit conflict");
                    return Err(SnapError::Conflict(format!("{:?}", key)));
                }
            }
        }

        let seq = self.sequence.begin_commit();

        if let Some(wal) = &self.wal {
            let operations = overlay
                .iter()
                .map(|(key, op)| match op {
                    PendingOp::Set(value) => Operation::Put {
                        key: key.to_vec(),
                        value: value.to_vec(),
                    },
                    PendingOp::Delete => Operation::Delete { key: key.to_vec() },
                })
                .collect();

            if let Err(e) = wal.lock().append(seq, operations) {
                self.sequence.finish_commit(seq);
                warn!(seq, error = %e, "WAL append failed; commit aborted");
                return Err(e);
            }
        }

        let batch: Vec<(&Bytes, Payload)> = overlay
            .iter()
            .map(|(key, op)| (key, op.to_payload()))
            .collect();
        let horizon = self.readers.horizon(&self.sequence);
        self.store.publish(batch.iter().map(|(k, p)| (*k, p)), seq, horizon);
        self.sequence.finish_commit(seq);
        drop(guard);

        // Older disjoint commits may still be publishing
        self.sequence.wait_visible(seq);

        self.commits.fetch_add(1, Ordering::Relaxed);
        debug!(seq, keys = overlay.len(), "committed");
        Ok(Some(seq))
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Drop every version no active reader can resolve
    ///
    /// Returns the number of records removed.
    pub fn collect_garbage(&self) -> usize {
        let horizon = self.readers.horizon(&self.sequence);
        let removed = self.store.prune(horizon);
        debug!(horizon, removed, "collected garbage");
        removed
    }

    /// Force the WAL to stable storage (no-op in memory)
    pub fn sync(&self) -> Result<()> {
        match &self.wal {
            Some(wal) => wal.lock().sync(),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            committed_seq: self.sequence.read_point(),
            keys: self.store.key_count(),
            versions: self.store.version_count(),
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
