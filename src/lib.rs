//! # SnapKV
//!
//! An embeddable, transactional key-value store with:
//! - Multi-version concurrency control (every commit adds versions, nothing
//!   is overwritten in place)
//! - Optimistic transactions validated per key at commit
//! - Read-only snapshots frozen at creation
//! - Ordered range scans in both directions
//! - Optional Write-Ahead Logging (WAL) for durability
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │             MemoryDatabase / DurableDatabase                 │
//! │                (KvDatabase factory)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Transaction │          │  Snapshot   │
//!   │  (overlay)  │          │ (read_seq)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          │ commit                 │ read
//!          ▼                        ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                               │
//! │  KeyLocks → validate → SequenceAllocator → WAL → publish     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!                       ▼
//!              ┌─────────────────┐
//!              │ VersionedStore  │
//!              │ (RwLock BTree)  │
//!              └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use snapkv::{Context, KvDatabase, KvReader, KvSnapshot, KvTransaction, MemoryDatabase};
//! use std::io::Read;
//!
//! let ctx = Context::background();
//! let db = MemoryDatabase::new();
//!
//! let mut tx = db.new_transaction(&ctx)?;
//! tx.set_bytes(&ctx, "greeting", "hello")?;
//! tx.commit(&ctx)?;
//!
//! let mut snap = db.new_snapshot(&ctx)?;
//! let mut value = String::new();
//! snap.get(&ctx, "greeting")?.read_to_string(&mut value)?;
//! assert_eq!(value, "hello");
//! snap.discard(&ctx)?;
//! # Ok::<(), snapkv::SnapError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod context;
pub mod error;

pub mod key;
pub mod mvcc;
pub mod value;
pub mod wal;

pub mod database;
pub mod engine;
pub mod range;
pub mod snapshot;
pub mod transaction;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, WalSyncStrategy};
pub use context::Context;
pub use database::{DurableDatabase, KvDatabase, KvReader, KvSnapshot, KvTransaction, MemoryDatabase};
pub use engine::EngineStats;
pub use error::{ErrorKind, Result, SnapError};
pub use key::prefix_range;
pub use range::{RangeEntry, RangeIter};
pub use snapshot::Snapshot;
pub use transaction::{Transaction, TransactionState};
pub use value::ValueReader;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of SnapKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
