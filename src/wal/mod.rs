//! Write-Ahead Log (WAL) Module
//!
//! Commit log of the durable backend. A commit batch is appended (and,
//! depending on [`WalSyncStrategy`](crate::config::WalSyncStrategy),
//! fsynced) before any of its records become visible in the store.
//!
//! ## Responsibilities
//! - One entry per commit batch, stamped with its commit sequence
//! - CRC32 over every payload so torn or flipped bytes are detected
//! - Replay in file order on open; the first bad frame ends the log
//!
//! ## Frame Layout (little-endian)
//! ```text
//!  0        8        12       16                      16 + len
//!  ├────────┼────────┼────────┼───────────────────────────┤
//!  │  LSN   │ CRC32  │  len   │ bincode(WalEntry)         │
//!  └────────┴────────┴────────┴───────────────────────────┘
//!                               lsn, commit_seq, timestamp,
//!                               operations: [Put | Delete]
//! ```
//!
//! A frame whose header or payload runs past the end of the file is a torn
//! write and reads as end of log. A complete frame with a bad checksum is
//! corruption; recovery keeps everything before it and drops the rest.

mod entry;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, HEADER_SIZE};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
