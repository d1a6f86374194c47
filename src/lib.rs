//! bamtally: count reads in a region of an indexed BAM file
//!
//! # Overview
//!
//! bamtally streams alignment records out of a BGZF-compressed BAM, uses the
//! BAI index to jump straight to a region, and classifies each read:
//! on target, high mapping quality, and over a mismatch-rate threshold.
//! Memory stays bounded by one BGZF block plus one record.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bamtally::{load_index, scan_region, FilterConfig};
//! use std::path::Path;
//!
//! # fn main() -> bamtally::Result<()> {
//! let bam = Path::new("sample.bam");
//! let index = load_index(bam, None, false)?;
//! let counts = scan_region(bam, &index, "chr1:10000-20000", &FilterConfig::default())?;
//!
//! println!("on target: {}", counts.on_target);
//! println!("high quality: {}", counts.high_quality);
//! println!("filtered: {}", counts.filtered());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`io`]: BGZF blocks, BAM records and headers, BAI indexes
//! - [`filter`]: per-read classification and counting
//! - [`scan`]: file-level driver tying the two together
//! - [`error`]: the crate error type

#![warn(rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod filter;
pub mod io;
pub mod scan;

pub use error::{Error, Result};
pub use filter::{count_reads, evaluate, FilterConfig, ReadCounts, ReadOutcome};
pub use io::bam::{BaiIndex, BamReader, Record, Region};
pub use scan::{load_index, locate_index, scan_file, scan_region};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
