//! Byte-exact slicing of a decoded data stream.
//!
//! Decoders hand out output in whatever sizes suit them. Transfer commands
//! ask for exact byte counts that have nothing to do with those sizes.
//! [`StreamCarry`] sits between the two and keeps the leftover tail of the
//! last decoded chunk so the next request starts exactly where the previous
//! one stopped.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};

use tracing::{trace, warn};

use crate::error::{OtaError, Result};
use crate::BUF_SIZE;

/// Producer of successive decoded chunks of arbitrary size.
pub trait ChunkSource {
    /// Next run of decoded bytes, or `None` once the source is exhausted.
    /// An empty chunk is allowed and simply means "nothing yet".
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

impl<S: ChunkSource + ?Sized> ChunkSource for Box<S> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        (**self).next_chunk()
    }
}

/// Read up to `buf.len()` bytes, retrying on interruption. Returns 0 at EOF.
fn read_some<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    loop {
        match reader.read(buf) {
            Ok(n) => return Ok(n),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
}

fn read_chunk<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut buf = vec![0u8; BUF_SIZE];
    let n = read_some(reader, &mut buf)?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some(buf))
}

/// Brotli-compressed data source.
///
/// A cut-off or corrupt stream ends the decoded data at the last good byte,
/// so a pull past that point fails with [`OtaError::ShortRead`].
pub struct BrotliChunks<R: Read> {
    decoder: brotli::Decompressor<R>,
    broken: bool,
}

impl<R: Read> BrotliChunks<R> {
    /// Compressed input is pulled from `reader` in `BUF_SIZE` pieces.
    pub fn new(reader: R) -> Self {
        Self {
            decoder: brotli::Decompressor::new(reader, BUF_SIZE),
            broken: false,
        }
    }
}

impl<R: Read> ChunkSource for BrotliChunks<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        if self.broken {
            return Ok(None);
        }
        match read_chunk(&mut self.decoder) {
            Err(OtaError::Io(e))
                if matches!(e.kind(), ErrorKind::InvalidData | ErrorKind::UnexpectedEof) =>
            {
                warn!(error = %e, "brotli stream ends early");
                self.broken = true;
                Ok(None)
            }
            other => other,
        }
    }
}

/// Uncompressed data source: bytes pass through unchanged.
pub struct PlainChunks<R: Read> {
    reader: R,
}

impl<R: Read> PlainChunks<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> ChunkSource for PlainChunks<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        read_chunk(&mut self.reader)
    }
}

/// Pre-decoded chunks held in memory.
#[derive(Debug, Default)]
pub struct MemoryChunks {
    chunks: VecDeque<Vec<u8>>,
}

impl MemoryChunks {
    pub fn new<I: IntoIterator<Item = Vec<u8>>>(chunks: I) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }
}

impl ChunkSource for MemoryChunks {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        Ok(self.chunks.pop_front())
    }
}

/// Slices a [`ChunkSource`] into exactly sized pulls.
///
/// Holds at most one pending carry buffer: the decoded bytes left over after
/// the last pull. Every byte the source yields is returned by exactly one
/// pull, in order.
pub struct StreamCarry<S> {
    source: S,
    carry: Option<Vec<u8>>,
    exhausted: bool,
    pulled: u64,
}

impl<S: ChunkSource> StreamCarry<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            carry: None,
            exhausted: false,
            pulled: 0,
        }
    }

    /// Return exactly `n` bytes, decoding more input as needed.
    ///
    /// Fails with [`OtaError::ShortRead`] if the source runs out first; the
    /// bytes that were available stay in the carry.
    pub fn pull(&mut self, n: usize) -> Result<Vec<u8>> {
        if n == 0 {
            return Ok(Vec::new());
        }

        if let Some(carry) = self.carry.as_mut() {
            if carry.len() >= n {
                let rest = carry.split_off(n);
                let out = std::mem::replace(carry, rest);
                if carry.is_empty() {
                    self.carry = None;
                }
                self.pulled += n as u64;
                return Ok(out);
            }
        }

        let mut work = self.carry.take().unwrap_or_default();
        while work.len() < n && !self.exhausted {
            match self.source.next_chunk()? {
                Some(chunk) => {
                    trace!(len = chunk.len(), "decoded chunk");
                    if work.is_empty() {
                        work = chunk;
                    } else {
                        work.extend_from_slice(&chunk);
                    }
                }
                None => self.exhausted = true,
            }
        }

        if work.len() < n {
            let available = work.len();
            if !work.is_empty() {
                self.carry = Some(work);
            }
            return Err(OtaError::ShortRead { wanted: n, available });
        }

        let rest = work.split_off(n);
        if !rest.is_empty() {
            self.carry = Some(rest);
        }
        self.pulled += n as u64;
        Ok(work)
    }

    /// Total bytes handed out so far.
    pub fn bytes_pulled(&self) -> u64 {
        self.pulled
    }

    /// Bytes currently held over for the next pull.
    pub fn carried(&self) -> usize {
        self.carry.as_ref().map_or(0, Vec::len)
    }

    /// Drain the source and report how many decoded bytes were never pulled.
    pub fn finish(mut self) -> Result<u64> {
        let mut trailing = self.carried() as u64;
        while !self.exhausted {
            match self.source.next_chunk()? {
                Some(chunk) => trailing += chunk.len() as u64,
                None => self.exhausted = true,
            }
        }
        Ok(trailing)
    }
}
