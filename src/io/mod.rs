//! I/O module: BGZF compression and the BAM/BAI formats
//!
//! Everything here streams: readers hold one decompressed block and one
//! record at a time regardless of file size.

pub mod bam;
pub mod bgzf;

pub use bam::{BaiIndex, BamReader, BamWriter, Header, Record};
pub use bgzf::{BgzfReader, BgzfWriter, VirtualOffset};
