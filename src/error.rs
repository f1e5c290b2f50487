//! Error types for SnapKV
//!
//! Provides a unified error type for all operations. Callers branch on the
//! sentinel kinds (`NotFound`, `Conflict`, ...) through [`SnapError::kind`]
//! or the `is_*` helpers rather than on message text.

use thiserror::Error;

/// Result type alias using SnapError
pub type Result<T> = std::result::Result<T, SnapError>;

/// Unified error type for SnapKV operations
#[derive(Debug, Error)]
pub enum SnapError {
    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Key not found")]
    NotFound,

    #[error("Transaction or snapshot is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Commit conflict: {0} was modified by a concurrent transaction")]
    Conflict(String),

    // -------------------------------------------------------------------------
    // Context Errors
    // -------------------------------------------------------------------------
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification of a [`SnapError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Empty key, invalid range, oversized value
    InvalidArgument,
    /// Key absent in the resolved view
    NotFound,
    /// Operation on a finalized transaction or discarded snapshot
    Closed,
    /// Optimistic concurrency failure at commit; retry with a new transaction
    Conflict,
    /// Cancellation or deadline
    Cancelled,
    /// I/O, WAL, serialization and configuration failures
    Storage,
}

impl SnapError {
    /// Build an `InvalidArgument` error
    pub fn invalid(msg: impl Into<String>) -> Self {
        SnapError::InvalidArgument(msg.into())
    }

    /// Sentinel kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SnapError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            SnapError::NotFound => ErrorKind::NotFound,
            SnapError::Closed => ErrorKind::Closed,
            SnapError::Conflict(_) => ErrorKind::Conflict,
            SnapError::Cancelled | SnapError::DeadlineExceeded => ErrorKind::Cancelled,
            SnapError::Io(_)
            | SnapError::WalCorruption(_)
            | SnapError::WalWrite(_)
            | SnapError::Serialization(_)
            | SnapError::Config(_) => ErrorKind::Storage,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_invalid_argument(&self) -> bool {
        self.kind() == ErrorKind::InvalidArgument
    }

    pub fn is_closed(&self) -> bool {
        self.kind() == ErrorKind::Closed
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Whether a new transaction may succeed where this one failed
    pub fn is_retryable(&self) -> bool {
        self.is_conflict()
    }
}

impl From<bincode::Error> for SnapError {
    fn from(e: bincode::Error) -> Self {
        SnapError::Serialization(e.to_string())
    }
}
