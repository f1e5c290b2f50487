//! Value streams
//!
//! Values enter the store as `std::io::Read` streams and leave it as
//! [`ValueReader`]s. Stored values are `Bytes`, so handing one to a reader
//! is a reference-count bump, not a copy of the version history.

use std::io::{self, BufRead, Read};

use bytes::{Buf, Bytes, BytesMut};

use crate::context::Context;
use crate::error::{Result, SnapError};

/// Incrementally consumable view of a stored value
#[derive(Debug, Clone)]
pub struct ValueReader {
    data: Bytes,
}

impl ValueReader {
    pub fn new(data: Bytes) -> Self {
        Self { data }
    }

    /// Bytes not yet read
    pub fn remaining(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The unread part of the value, without copying
    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    /// Copy the unread part of the value into a `Vec`
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }
}

impl Read for ValueReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = buf.len().min(self.data.len());
        self.data.copy_to_slice(&mut buf[..n]);
        Ok(n)
    }
}

impl BufRead for ValueReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(self.data.chunk())
    }

    fn consume(&mut self, amt: usize) {
        self.data.advance(amt.min(self.data.len()));
    }
}

/// Drain `reader` into an owned buffer
///
/// Reads `chunk_size` bytes at a time, checking `ctx` between chunks, and
/// fails with `InvalidArgument` once the value would exceed `max_size`.
/// Nothing is retained on failure.
pub(crate) fn read_value<R: Read>(
    ctx: &Context,
    mut reader: R,
    max_size: usize,
    chunk_size: usize,
) -> Result<Bytes> {
    let mut out = BytesMut::new();
    let mut chunk = vec![0u8; chunk_size];

    loop {
        ctx.checkpoint()?;

        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(SnapError::Io(e)),
        };

        if out.len() + n > max_size {
            return Err(SnapError::invalid(format!(
                "value exceeds maximum size of {} bytes",
                max_size
            )));
        }
        out.extend_from_slice(&chunk[..n]);
    }

    Ok(out.freeze())
}
