//! BGZF writer.
//!
//! Buffers uncompressed input into blocks of at most [`BLOCK_DATA_SIZE`]
//! bytes and writes each one as an independent gzip member with the `BC`
//! extra subfield. Blocks are compressed sequentially so the compressed
//! position, and therefore the current virtual offset, is always known.

use super::{VirtualOffset, EOF_MARKER, MAX_BLOCK_SIZE};
use crate::error::{Error, Result};
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{self, Write};

/// Uncompressed bytes per full block.
///
/// Smaller than 64 KiB so that incompressible input still fits the 16-bit
/// BSIZE field after deflate overhead.
pub const BLOCK_DATA_SIZE: usize = 0xff00;

/// BGZF writer.
///
/// Call [`BgzfWriter::finish`] to flush the last block and append the EOF
/// marker; dropping the writer without finishing leaves a truncated file.
pub struct BgzfWriter<W: Write> {
    inner: W,
    /// Uncompressed data for the block being filled
    buffer: Vec<u8>,
    /// Compressed bytes written so far
    compressed_offset: u64,
    level: Compression,
}

impl<W: Write> BgzfWriter<W> {
    /// Create a writer with the default compression level.
    pub fn new(inner: W) -> Self {
        Self::with_level(inner, Compression::default())
    }

    /// Create a writer with an explicit compression level.
    pub fn with_level(inner: W, level: Compression) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(BLOCK_DATA_SIZE),
            compressed_offset: 0,
            level,
        }
    }

    /// Virtual offset at which the next written byte will land.
    pub fn virtual_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.compressed_offset, self.buffer.len() as u16)
    }

    /// Compress and write the pending block, even if it is not full.
    ///
    /// Does nothing when no data is pending.
    pub fn flush_block(&mut self) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let block = compress_block(&self.buffer, self.level)?;
        self.inner.write_all(&block)?;
        self.compressed_offset += block.len() as u64;
        self.buffer.clear();
        Ok(())
    }

    /// Flush remaining data, write the EOF marker and return the sink.
    pub fn finish(mut self) -> Result<W> {
        self.flush_block()?;
        self.inner.write_all(&EOF_MARKER)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let space = BLOCK_DATA_SIZE - self.buffer.len();
        let n = space.min(buf.len());
        self.buffer.extend_from_slice(&buf[..n]);

        if self.buffer.len() >= BLOCK_DATA_SIZE {
            self.flush_block()?;
        }

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_block()?;
        self.inner.flush()
    }
}

/// Compress one block of data into a complete BGZF member.
///
/// Header (10 bytes): magic, CM=8, FLG=FEXTRA, MTIME=0, XFL=0, OS=255;
/// XLEN=6 and the `BC` subfield carrying BSIZE; then raw deflate data,
/// CRC32 and ISIZE.
pub(crate) fn compress_block(data: &[u8], level: Compression) -> Result<Vec<u8>> {
    let mut deflate = DeflateEncoder::new(Vec::with_capacity(data.len()), level);
    deflate.write_all(data)?;
    let deflated = deflate.finish()?;

    let total_size = 18 + deflated.len() + 8;
    if total_size > MAX_BLOCK_SIZE {
        return Err(Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("compressed block of {} bytes exceeds BGZF limit", total_size),
        )));
    }

    let mut block = Vec::with_capacity(total_size);
    block.extend_from_slice(&[31, 139, 8, 4, 0, 0, 0, 0, 0, 255]);
    block.extend_from_slice(&6u16.to_le_bytes());
    block.extend_from_slice(&[b'B', b'C']);
    block.extend_from_slice(&2u16.to_le_bytes());
    block.extend_from_slice(&((total_size - 1) as u16).to_le_bytes());
    block.extend_from_slice(&deflated);
    block.extend_from_slice(&crc32fast::hash(data).to_le_bytes());
    block.extend_from_slice(&(data.len() as u32).to_le_bytes());

    Ok(block)
}
