//! Database Module
//!
//! The transactional contract and its two backends.
//!
//! ## Traits
//! - [`KvDatabase`]: factory for transactions and snapshots
//! - [`KvReader`]: point reads and ordered range scans
//! - [`KvTransaction`]: buffered writes, commit, rollback
//! - [`KvSnapshot`]: read-only view, discard
//!
//! ## Backends
//! - [`MemoryDatabase`]: everything in memory, lost on drop
//! - [`DurableDatabase`]: every commit logged to a WAL before it becomes
//!   visible, replayed on open

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::context::Context;
use crate::engine::{Engine, EngineStats};
use crate::error::Result;
use crate::range::RangeIter;
use crate::snapshot::Snapshot;
use crate::transaction::{Transaction, TransactionState};
use crate::value::ValueReader;

// =============================================================================
// Traits
// =============================================================================

/// Read operations shared by transactions and snapshots
///
/// An empty key is `InvalidArgument`. An empty range bound is unbounded on
/// that side; `begin > end` (both non-empty) is `InvalidArgument`.
pub trait KvReader {
    /// Value visible for `key`, or `NotFound`
    fn get<K: AsRef<[u8]>>(&self, ctx: &Context, key: K) -> Result<ValueReader>;

    /// Live entries in `[begin, end)`, smallest key first
    fn ascend<B: AsRef<[u8]>, E: AsRef<[u8]>>(&self, ctx: &Context, begin: B, end: E) -> Result<RangeIter>;

    /// Live entries in `[begin, end)`, largest key first
    fn descend<B: AsRef<[u8]>, E: AsRef<[u8]>>(&self, ctx: &Context, begin: B, end: E) -> Result<RangeIter>;
}

/// Read-write transaction
///
/// `commit` and `rollback` on a finished transaction return `Ok(())`;
/// every other operation returns `Closed`.
pub trait KvTransaction: KvReader {
    /// Buffer `key = value`, draining the value stream now
    fn set<K: AsRef<[u8]>, R: Read>(&mut self, ctx: &Context, key: K, value: R) -> Result<()>;

    /// Buffer `key = value` from an in-memory value
    fn set_bytes<K: AsRef<[u8]>, V: AsRef<[u8]>>(&mut self, ctx: &Context, key: K, value: V) -> Result<()> {
        self.set(ctx, key, value.as_ref())
    }

    /// Buffer a delete; deleting an absent key is not an error
    fn delete<K: AsRef<[u8]>>(&mut self, ctx: &Context, key: K) -> Result<()>;

    /// Publish every buffered write atomically, or fail with `Conflict`
    fn commit(&mut self, ctx: &Context) -> Result<()>;

    /// Discard every buffered write
    fn rollback(&mut self, ctx: &Context) -> Result<()>;

    fn state(&self) -> TransactionState;

    /// Number of keys with a buffered write
    fn pending_operations(&self) -> usize;
}

/// Read-only view fixed at creation
pub trait KvSnapshot: KvReader {
    /// Release the snapshot; repeated calls return `Ok(())`
    fn discard(&mut self, ctx: &Context) -> Result<()>;
}

/// Factory for transactions and snapshots over one shared engine
pub trait KvDatabase: Send + Sync {
    type Txn: KvTransaction + Send + fmt::Debug;
    type Snap: KvSnapshot + Send + fmt::Debug;

    fn new_transaction(&self, ctx: &Context) -> Result<Self::Txn>;

    fn new_snapshot(&self, ctx: &Context) -> Result<Self::Snap>;

    fn stats(&self) -> EngineStats;

    /// Drop every record no open transaction or snapshot can read;
    /// returns how many were removed
    fn collect_garbage(&self) -> usize;
}

// =============================================================================
// In-memory backend
// =============================================================================

/// Database whose state lives only in process memory
#[derive(Clone)]
pub struct MemoryDatabase {
    engine: Arc<Engine>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self {
            engine: Arc::new(Engine::in_memory_default()),
        }
    }

    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(Engine::in_memory(config)?),
        })
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl KvDatabase for MemoryDatabase {
    type Txn = Transaction;
    type Snap = Snapshot;

    fn new_transaction(&self, ctx: &Context) -> Result<Transaction> {
        ctx.checkpoint()?;
        Ok(Transaction::begin(Arc::clone(&self.engine)))
    }

    fn new_snapshot(&self, ctx: &Context) -> Result<Snapshot> {
        ctx.checkpoint()?;
        Ok(Snapshot::capture(Arc::clone(&self.engine)))
    }

    fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    fn collect_garbage(&self) -> usize {
        self.engine.collect_garbage()
    }
}

// =============================================================================
// Durable backend
// =============================================================================

/// Database whose commits survive restarts through a WAL
#[derive(Clone)]
pub struct DurableDatabase {
    engine: Arc<Engine>,
}

impl DurableDatabase {
    /// Open or create a database under `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(Engine::open(config)?),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Force every logged commit to stable storage
    pub fn sync(&self) -> Result<()> {
        self.engine.sync()
    }

    /// Sync the WAL and release this handle
    pub fn close(self) -> Result<()> {
        self.engine.sync()?;
        info!(data_dir = %self.engine.config().data_dir.display(), "closed durable database");
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.engine.config().data_dir
    }
}

impl KvDatabase for DurableDatabase {
    type Txn = Transaction;
    type Snap = Snapshot;

    fn new_transaction(&self, ctx: &Context) -> Result<Transaction> {
        ctx.checkpoint()?;
        Ok(Transaction::begin(Arc::clone(&self.engine)))
    }

    fn new_snapshot(&self, ctx: &Context) -> Result<Snapshot> {
        ctx.checkpoint()?;
        Ok(Snapshot::capture(Arc::clone(&self.engine)))
    }

    fn stats(&self) -> EngineStats {
        self.engine.stats()
    }

    fn collect_garbage(&self) -> usize {
        self.engine.collect_garbage()
    }
}

impl fmt::Debug for MemoryDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryDatabase").finish_non_exhaustive()
    }
}

impl fmt::Debug for DurableDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableDatabase").finish_non_exhaustive()
    }
}
