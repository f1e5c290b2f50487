//! Configuration for SnapKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, SnapError};

/// Main configuration for a SnapKV database
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for the durable backend
    /// Internal structure:
    ///   {data_dir}/
    ///     └── wal.log          (commit log)
    ///
    /// Ignored by the in-memory backend.
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Value Configuration
    // -------------------------------------------------------------------------
    /// Largest value accepted by `set` (in bytes)
    pub max_value_size: usize,

    /// Read size used when draining a value stream (in bytes)
    pub value_chunk_size: usize,

    // -------------------------------------------------------------------------
    // Concurrency Configuration
    // -------------------------------------------------------------------------
    /// Number of commit lock stripes keys are hashed onto
    pub lock_stripes: usize,

    /// Keys examined per store lock acquisition during range scans
    pub scan_batch_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every commit (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced commits (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./snapkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            max_value_size: 64 * 1024 * 1024, // 64 MB
            value_chunk_size: 64 * 1024,      // 64 KB
            lock_stripes: 256,
            scan_batch_size: 128,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.lock_stripes == 0 {
            return Err(SnapError::Config("lock_stripes must be at least 1".to_string()));
        }
        if self.scan_batch_size == 0 {
            return Err(SnapError::Config("scan_batch_size must be at least 1".to_string()));
        }
        if self.value_chunk_size == 0 {
            return Err(SnapError::Config("value_chunk_size must be at least 1".to_string()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(SnapError::Config(
                "EveryNEntries sync count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the maximum value size (in bytes)
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the stream read chunk size (in bytes)
    pub fn value_chunk_size(mut self, size: usize) -> Self {
        self.config.value_chunk_size = size;
        self
    }

    /// Set the number of commit lock stripes
    pub fn lock_stripes(mut self, count: usize) -> Self {
        self.config.lock_stripes = count;
        self
    }

    /// Set the range scan batch size
    pub fn scan_batch_size(mut self, count: usize) -> Self {
        self.config.scan_batch_size = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
