//! WAL Writer
//!
//! Handles appending commit batches to the WAL file.
//!
//! A batch either lands whole or not at all: when a write, flush, or fsync
//! fails the file is cut back to the length it had before the append, so a
//! commit reported as failed never comes back during recovery.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{Operation, WalEntry, WalReader};
use crate::config::WalSyncStrategy;
use crate::error::{Result, SnapError};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,

    /// LSN the next append will receive
    next_lsn: u64,

    sync_strategy: WalSyncStrategy,

    /// File length after the last complete entry
    offset: u64,

    /// Entries appended since the last fsync
    uncommitted: usize,

    /// The file tail is unknown (a failed append could not be cut back)
    failed: bool,

    #[cfg(test)]
    fail_next_sync: bool,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// Appends continue after the last valid entry already in the file.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            let mut reader = WalReader::open(path)?;
            let mut last = 0;
            while let Some(entry) = reader.next_entry()? {
                last = entry.lsn;
            }
            last
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let offset = file.metadata()?.len();
        debug!(path = %path.display(), next_lsn = last_lsn + 1, offset, "opened WAL writer");

        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            offset,
            sync_strategy,
            uncommitted: 0,
            failed: false,
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    /// Append one commit batch to the WAL
    ///
    /// Returns the LSN assigned to the entry. The entry is on stable
    /// storage when this returns only under `EveryWrite`, or when it is the
    /// entry that reaches the `EveryNEntries` threshold.
    pub fn append(&mut self, commit_seq: u64, operations: Vec<Operation>) -> Result<u64> {
        if self.failed {
            return Err(SnapError::WalWrite(format!(
                "{} is unusable after a failed write",
                self.path.display()
            )));
        }

        let lsn = self.next_lsn;
        let frame = WalEntry::new(lsn, commit_seq, operations).serialize()?;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted + 1 >= count,
        };
        if let Err(e) = self.write_frame(&frame, due) {
            self.discard_from(self.offset);
            return Err(SnapError::WalWrite(format!("append LSN {}: {}", lsn, e)));
        }

        self.next_lsn += 1;
        self.offset += frame.len() as u64;
        self.uncommitted = if due { 0 } else { self.uncommitted + 1 };
        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8], sync: bool) -> io::Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        if sync {
            self.sync_file()?;
        }
        Ok(())
    }

    fn sync_file(&mut self) -> io::Result<()> {
        #[cfg(test)]
        let injected = std::mem::take(&mut self.fail_next_sync);
        #[cfg(not(test))]
        let injected = false;

        if injected {
            return Err(io::Error::new(io::ErrorKind::Other, "injected sync failure"));
        }
        self.writer.get_ref().sync_data()
    }

    /// Cut the file back to `offset`, dropping whatever the failed append
    /// left in the buffer or on disk
    fn discard_from(&mut self, offset: u64) {
        let handle = self.writer.get_ref().try_clone();
        let result = handle.and_then(|file| {
            // into_parts hands back the unflushed bytes instead of writing them
            let old = std::mem::replace(&mut self.writer, BufWriter::new(file));
            let (_, _unwritten) = old.into_parts();
            let file = self.writer.get_mut();
            file.set_len(offset)?;
            file.sync_all()
        });

        if let Err(e) = result {
            self.failed = true;
            warn!(path = %self.path.display(), offset, error = %e, "could not discard failed WAL append");
        } else {
            debug!(path = %self.path.display(), offset, "discarded failed WAL append");
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        if let Err(e) = self.writer.flush().and_then(|_| self.sync_file()) {
            self.failed = true;
            return Err(SnapError::WalWrite(format!("sync {}: {}", self.path.display(), e)));
        }
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard every entry and restart numbering at LSN 1
    pub fn truncate(&mut self) -> Result<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        self.next_lsn = 1;
        self.offset = 0;
        self.uncommitted = 0;
        self.failed = false;
        Ok(())
    }

    /// LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries written but not yet fsynced
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make the next fsync report an I/O error
    #[cfg(test)]
    pub(crate) fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }
}
