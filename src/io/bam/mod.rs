//! Native BAM (Binary Alignment Map) support.
//!
//! - [`header`]: magic, SAM text and reference dictionary
//! - [`record`]: alignment record decoding and encoding, built on
//!   [`cigar`], [`sequence`] and [`tags`]
//! - [`reader`] / [`writer`]: streaming access over BGZF
//! - [`index`] / [`region`]: BAI indexes and region queries
//!
//! # Example
//!
//! ```no_run
//! use bamtally::io::bam::{BaiIndex, BamReader};
//!
//! # fn main() -> bamtally::Result<()> {
//! let index = BaiIndex::from_path("alignments.bam.bai")?;
//! let mut bam = BamReader::from_path("alignments.bam")?;
//!
//! for record in bam.query(&index, "chr1:1,000,000-1,001,000")? {
//!     let record = record?;
//!     println!("{} mapq={}", record.name, record.mapq);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cigar;
pub mod header;
pub mod index;
pub mod reader;
pub mod record;
pub mod region;
pub mod sequence;
pub mod tags;
pub mod writer;

pub use cigar::{decode_cigar, encode_cigar, CigarOp};
pub use header::{read_header, write_header, Header, Reference};
pub use index::{build_index, BaiIndex, Bin, Chunk, IndexBuilder, ReferenceIndex};
pub use reader::{BamReader, Records, RegionQuery};
pub use record::{decode_record, encode_record, Record};
pub use region::{Region, ResolvedRegion};
pub use sequence::{decode_sequence, encode_sequence};
pub use tags::{decode_tags, encode_tags, ArrayValue, Tag, TagValue, Tags};
pub use writer::BamWriter;
