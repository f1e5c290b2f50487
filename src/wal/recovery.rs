//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::{info, warn};

use super::{WalEntry, WalReader};
use crate::error::{Result, SnapError};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries found (scanning stops at the first)
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether data past the last valid entry was (or would be) removed
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read entries in order
    /// 2. Stop at the first corrupted or partially written entry
    /// 3. Truncate the file to the end of the last valid entry
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_offset) = Self::scan(path)?;

        if result.was_truncated {
            warn!(
                path = %path.display(),
                valid_offset,
                corrupted = result.entries_corrupted,
                "truncating WAL tail"
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_offset)?;
            file.sync_all()?;
        }

        info!(
            path = %path.display(),
            entries = result.entries_recovered,
            last_lsn = result.last_lsn,
            "WAL recovery complete"
        );
        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut result = RecoveryResult::default();
        let mut entries = Vec::new();

        if !path.exists() {
            return Ok((entries, result, 0));
        }

        let mut reader = WalReader::open(path)?;
        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(SnapError::WalCorruption(reason)) | Err(SnapError::Serialization(reason)) => {
                    warn!(path = %path.display(), %reason, "corrupt WAL entry");
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let valid_offset = reader.valid_offset();
        result.was_truncated = valid_offset < reader.file_len();
        Ok((entries, result, valid_offset))
    }
}
