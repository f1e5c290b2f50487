//! WAL Entry definitions
//!
//! One entry holds a whole commit batch, so replay restores it atomically.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapError};

/// Frame header: LSN (8) + CRC32 (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing within one file
    pub lsn: u64,

    /// Commit sequence the batch was published under
    pub commit_seq: u64,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,

    /// Every write of the batch, in key order
    pub operations: Vec<Operation>,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },
}

impl Operation {
    pub fn key(&self) -> &[u8] {
        match self {
            Operation::Put { key, .. } | Operation::Delete { key } => key,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

impl WalEntry {
    pub fn new(lsn: u64, commit_seq: u64, operations: Vec<Operation>) -> Self {
        Self {
            lsn,
            commit_seq,
            timestamp: now_millis(),
            operations,
        }
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// CRC32 of the encoded payload
    pub fn compute_crc(&self) -> Result<u32> {
        Ok(crc32fast::hash(&self.encode_payload()?))
    }

    /// Size of the full frame in bytes
    pub fn serialized_size(&self) -> Result<usize> {
        Ok(HEADER_SIZE + bincode::serialized_size(self)? as usize)
    }

    /// Encode as a complete frame (header + payload)
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;
        let len = u32::try_from(payload.len())
            .map_err(|_| SnapError::Serialization("WAL entry exceeds 4 GiB".to_string()))?;

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&crc32fast::hash(&payload).to_le_bytes());
        frame.extend_from_slice(&len.to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode one complete frame, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let (lsn, crc, len) = parse_header(bytes)?;
        let payload = bytes
            .get(HEADER_SIZE..HEADER_SIZE + len)
            .ok_or_else(|| SnapError::WalCorruption(format!("entry {} is truncated", lsn)))?;
        decode_payload(lsn, crc, payload)
    }
}

/// Split a frame header into (lsn, crc, payload length)
pub(crate) fn parse_header(bytes: &[u8]) -> Result<(u64, u32, usize)> {
    if bytes.len() < HEADER_SIZE {
        return Err(SnapError::WalCorruption(format!(
            "header needs {} bytes, found {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut lsn = [0u8; 8];
    let mut crc = [0u8; 4];
    let mut len = [0u8; 4];
    lsn.copy_from_slice(&bytes[0..8]);
    crc.copy_from_slice(&bytes[8..12]);
    len.copy_from_slice(&bytes[12..16]);

    Ok((
        u64::from_le_bytes(lsn),
        u32::from_le_bytes(crc),
        u32::from_le_bytes(len) as usize,
    ))
}

/// Verify and decode a frame payload
pub(crate) fn decode_payload(lsn: u64, crc: u32, payload: &[u8]) -> Result<WalEntry> {
    let actual = crc32fast::hash(payload);
    if actual != crc {
        return Err(SnapError::WalCorruption(format!(
            "checksum mismatch at LSN {}: expected {:08x}, got {:08x}",
            lsn, crc, actual
        )));
    }

    let entry: WalEntry = bincode::deserialize(payload)?;
    if entry.lsn != lsn {
        return Err(SnapError::WalCorruption(format!(
            "header LSN {} does not match entry LSN {}",
            lsn, entry.lsn
        )));
    }
    Ok(entry)
}
