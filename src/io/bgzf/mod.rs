//! BGZF (Blocked GNU Zip Format) reading and writing.
//!
//! BGZF is a series of concatenated gzip members, each holding at most
//! 64 KiB of uncompressed data. Every member carries its own compressed size
//! in a `BC` extra subfield, which lets a reader jump straight to any block
//! boundary.
//!
//! # Block Structure
//!
//! ```text
//! ID1=31 ID2=139 CM=8 FLG=4 MTIME(4) XFL OS XLEN(2)
//! extra subfields (XLEN bytes), including SI1='B' SI2='C' SLEN=2 BSIZE(2)
//! CDATA (raw deflate, BSIZE - XLEN - 19 bytes)
//! CRC32(4) ISIZE(4)
//! ```
//!
//! # Virtual File Offsets
//!
//! A position inside a BGZF stream is addressed by a [`VirtualOffset`]:
//! - High 48 bits: compressed file offset of the block start
//! - Low 16 bits: offset within the decompressed block
//!
//! Virtual offsets order the same way as the data they point at, so index
//! chunks can be sorted and merged on the raw value.

pub mod reader;
pub mod writer;

pub use reader::{BgzfReader, Block, Blocks};
pub use writer::BgzfWriter;

use std::fmt;

/// Gzip magic bytes.
pub(crate) const GZIP_MAGIC: [u8; 2] = [31, 139];

/// Length of the fixed gzip header before the extra field.
pub(crate) const HEADER_LEN: usize = 12;

/// CRC32 + ISIZE trailer length.
pub(crate) const TRAILER_LEN: usize = 8;

/// Largest block (compressed or uncompressed) allowed by the format.
pub const MAX_BLOCK_SIZE: usize = 65536;

/// The 28-byte empty block that terminates a well-formed BGZF file.
pub const EOF_MARKER: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// BGZF virtual file offset.
///
/// # Example
///
/// ```
/// use bamtally::io::bgzf::VirtualOffset;
///
/// let offset = VirtualOffset::new(1024, 512);
/// assert_eq!(offset.compressed_offset(), 1024);
/// assert_eq!(offset.uncompressed_offset(), 512);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    /// Create a virtual offset from block offset and in-block offset.
    pub fn new(compressed: u64, uncompressed: u16) -> Self {
        VirtualOffset((compressed << 16) | uncompressed as u64)
    }

    /// Create from raw 64-bit value.
    pub fn from_raw(value: u64) -> Self {
        VirtualOffset(value)
    }

    /// Raw 64-bit value.
    pub fn as_raw(self) -> u64 {
        self.0
    }

    /// Compressed file offset of the block (high 48 bits).
    pub fn compressed_offset(self) -> u64 {
        self.0 >> 16
    }

    /// Offset within the decompressed block (low 16 bits).
    pub fn uncompressed_offset(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl From<u64> for VirtualOffset {
    fn from(value: u64) -> Self {
        VirtualOffset(value)
    }
}

impl fmt::Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}",
            self.compressed_offset(),
            self.uncompressed_offset()
        )
    }
}
