//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::entry::{decode_payload, parse_header};
use super::{WalEntry, HEADER_SIZE};
use crate::error::Result;

/// Reads entries from the WAL file
///
/// A frame cut short by a crash (partial header or payload) reads as end of
/// log; a complete frame whose checksum fails is an error.
pub struct WalReader {
    reader: BufReader<File>,
    file_len: u64,

    /// End of the last complete, verified entry
    valid_offset: u64,

    /// Bytes consumed so far
    position: u64,

    /// Set once the end of the valid log has been reached
    at_end: bool,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            file_len,
            valid_offset: 0,
            position: 0,
            at_end: false,
        })
    }

    /// Read the next entry from the WAL
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        if self.at_end {
            return Ok(None);
        }
        match self.read_frame() {
            Ok(Some(entry)) => Ok(Some(entry)),
            other => {
                self.at_end = true;
                other
            }
        }
    }

    fn read_frame(&mut self) -> Result<Option<WalEntry>> {
        let remaining = self.file_len - self.position;
        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let mut header = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header)?;
        self.position += HEADER_SIZE as u64;

        // Header written but payload cut short
        let (lsn, crc, len) = parse_header(&header)?;
        if (len as u64) > self.file_len - self.position {
            return Ok(None);
        }

        let mut payload = vec![0u8; len];
        self.reader.read_exact(&mut payload)?;
        self.position += len as u64;

        let entry = decode_payload(lsn, crc, &payload)?;
        self.valid_offset = self.position;
        Ok(Some(entry))
    }

    /// Byte offset just past the last entry returned
    pub fn valid_offset(&self) -> u64 {
        self.valid_offset
    }

    /// Total size of the file when it was opened
    pub fn file_len(&self) -> u64 {
        self.file_len
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL entries
///
/// Yields each entry in order and stops after the first error.
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
