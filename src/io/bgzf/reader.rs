//! Seekable BGZF reader.
//!
//! Decompresses one block at a time and keeps only the current block in
//! memory. Reading is exposed both as a lazy sequence of [`Block`]s and as
//! a plain byte stream through [`std::io::Read`].

use super::{VirtualOffset, GZIP_MAGIC, HEADER_LEN, MAX_BLOCK_SIZE, TRAILER_LEN};
use crate::error::{Error, Result};
use flate2::read::DeflateDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

/// One decompressed BGZF block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    /// Compressed file offset of the block start
    pub offset: u64,
    /// Size of the block in the compressed stream (BSIZE + 1)
    pub compressed_size: u64,
    /// Decompressed payload
    pub data: Vec<u8>,
}

impl Block {
    /// Compressed offset of the block that follows this one.
    pub fn next_offset(&self) -> u64 {
        self.offset + self.compressed_size
    }

    /// Whether the block holds no data (e.g. the EOF marker).
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// BGZF reader over any byte source.
///
/// The source must be positioned at the start of a block when the reader is
/// created; offsets are counted from that point.
pub struct BgzfReader<R> {
    inner: R,
    /// Block currently being consumed
    block: Block,
    /// Read position inside `block.data`
    block_pos: usize,
    /// Compressed offset of the next block to load
    next_block_offset: u64,
}

impl<R: Read> BgzfReader<R> {
    /// Create a reader positioned at compressed offset 0.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            block: Block::default(),
            block_pos: 0,
            next_block_offset: 0,
        }
    }

    /// Virtual offset of the next unread byte.
    ///
    /// At the end of a block this is the start of the following block, the
    /// same convention index files use for chunk boundaries.
    pub fn virtual_offset(&self) -> VirtualOffset {
        if self.block_pos < self.block.data.len() {
            VirtualOffset::new(self.block.offset, self.block_pos as u16)
        } else {
            VirtualOffset::new(self.next_block_offset, 0)
        }
    }

    /// Lazy iterator over the remaining blocks.
    ///
    /// Any partially consumed block is abandoned; iteration starts at the
    /// next block boundary.
    pub fn blocks(&mut self) -> Blocks<'_, R> {
        self.block = Block::default();
        self.block_pos = 0;
        Blocks { reader: self }
    }

    /// Read and decompress the block at the current compressed position.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    pub fn read_block(&mut self) -> Result<Option<Block>> {
        let offset = self.next_block_offset;

        let mut header = [0u8; HEADER_LEN];
        let n = read_full(&mut self.inner, &mut header)?;
        if n == 0 {
            return Ok(None);
        }
        if n < HEADER_LEN {
            return Err(Error::corrupt_block(
                offset,
                format!("incomplete header ({} of {} bytes)", n, HEADER_LEN),
            ));
        }

        if header[0..2] != GZIP_MAGIC {
            return Err(Error::corrupt_block(
                offset,
                format!(
                    "invalid gzip magic: expected {:?}, got [{}, {}]",
                    GZIP_MAGIC, header[0], header[1]
                ),
            ));
        }
        if header[2] != 8 {
            return Err(Error::corrupt_block(
                offset,
                format!("unsupported compression method {}", header[2]),
            ));
        }
        if header[3] & 0x04 == 0 {
            return Err(Error::corrupt_block(offset, "missing FEXTRA flag"));
        }

        let xlen = u16::from_le_bytes([header[10], header[11]]) as usize;
        let mut extra = vec![0u8; xlen];
        self.inner
            .read_exact(&mut extra)
            .map_err(|e| Error::corrupt_block(offset, format!("truncated extra field: {}", e)))?;

        let block_size = match find_bsize(&extra) {
            Some(bsize) => bsize as usize + 1,
            None => return Err(Error::corrupt_block(offset, "missing BC subfield")),
        };

        let already_read = HEADER_LEN + xlen;
        if block_size < already_read + TRAILER_LEN {
            return Err(Error::corrupt_block(
                offset,
                format!("block size {} smaller than its header", block_size),
            ));
        }

        let mut rest = vec![0u8; block_size - already_read];
        self.inner
            .read_exact(&mut rest)
            .map_err(|e| Error::corrupt_block(offset, format!("truncated block: {}", e)))?;

        let trailer_start = rest.len() - TRAILER_LEN;
        let (cdata, trailer) = rest.split_at(trailer_start);
        let expected_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let expected_len =
            u32::from_le_bytes([trailer[4], trailer[5], trailer[6], trailer[7]]) as usize;

        if expected_len > MAX_BLOCK_SIZE {
            return Err(Error::corrupt_block(
                offset,
                format!("ISIZE {} exceeds {}", expected_len, MAX_BLOCK_SIZE),
            ));
        }

        let mut data = Vec::with_capacity(expected_len);
        DeflateDecoder::new(cdata)
            .read_to_end(&mut data)
            .map_err(|e| Error::corrupt_block(offset, format!("deflate error: {}", e)))?;

        if data.len() != expected_len {
            return Err(Error::corrupt_block(
                offset,
                format!(
                    "ISIZE mismatch: trailer says {}, decompressed {}",
                    expected_len,
                    data.len()
                ),
            ));
        }

        let actual_crc = crc32fast::hash(&data);
        if actual_crc != expected_crc {
            return Err(Error::corrupt_block(
                offset,
                format!(
                    "CRC32 mismatch: expected {:#010x}, got {:#010x}",
                    expected_crc, actual_crc
                ),
            ));
        }

        self.next_block_offset = offset + block_size as u64;

        Ok(Some(Block {
            offset,
            compressed_size: block_size as u64,
            data,
        }))
    }

    /// Load the next non-empty block. Returns `false` at end of stream.
    fn fill_block(&mut self) -> Result<bool> {
        loop {
            match self.read_block()? {
                Some(block) => {
                    let has_data = !block.is_empty();
                    self.block = block;
                    self.block_pos = 0;
                    if has_data {
                        return Ok(true);
                    }
                }
                None => {
                    self.block = Block::default();
                    self.block_pos = 0;
                    return Ok(false);
                }
            }
        }
    }

    /// Unwrap the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> BgzfReader<R> {
    /// Reposition at a virtual offset previously observed in this stream
    /// (or taken from an index built for it).
    pub fn seek(&mut self, target: VirtualOffset) -> Result<()> {
        let compressed = target.compressed_offset();
        let within = target.uncompressed_offset() as usize;

        self.inner.seek(SeekFrom::Start(compressed))?;
        self.next_block_offset = compressed;

        match self.read_block()? {
            Some(block) => {
                if within > block.data.len() {
                    return Err(Error::InvalidVirtualOffset {
                        offset: target.as_raw(),
                        msg: format!(
                            "in-block offset {} past block end ({} bytes)",
                            within,
                            block.data.len()
                        ),
                    });
                }
                self.block = block;
                self.block_pos = within;
            }
            None if within == 0 => {
                self.block = Block::default();
                self.block_pos = 0;
            }
            None => {
                return Err(Error::InvalidVirtualOffset {
                    offset: target.as_raw(),
                    msg: "points past end of stream".to_string(),
                });
            }
        }

        tracing::trace!(offset = %target, "bgzf seek");
        Ok(())
    }
}

impl BgzfReader<BufReader<File>> {
    /// Open a BGZF file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> Read for BgzfReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.block_pos >= self.block.data.len() && !self.fill_block()? {
            return Ok(0);
        }

        let available = &self.block.data[self.block_pos..];
        let to_copy = available.len().min(buf.len());
        buf[..to_copy].copy_from_slice(&available[..to_copy]);
        self.block_pos += to_copy;

        Ok(to_copy)
    }
}

/// Lazy sequence of decompressed blocks.
///
/// Created by [`BgzfReader::blocks()`].
pub struct Blocks<'a, R> {
    reader: &'a mut BgzfReader<R>,
}

impl<'a, R: Read> Iterator for Blocks<'a, R> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_block().transpose()
    }
}

/// Locate the BSIZE value in a gzip extra field.
fn find_bsize(extra: &[u8]) -> Option<u16> {
    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[pos + 2], extra[pos + 3]]) as usize;
        if extra[pos] == b'B' && extra[pos + 1] == b'C' && slen == 2 {
            if pos + 6 > extra.len() {
                return None;
            }
            return Some(u16::from_le_bytes([extra[pos + 4], extra[pos + 5]]));
        }
        pos += 4 + slen;
    }
    None
}

/// Fill `buf` as far as the source allows; returns the number of bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
