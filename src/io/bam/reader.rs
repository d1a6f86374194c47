//! BAM streaming reader.
//!
//! The header is read once when the reader is created, then records are
//! decoded one at a time out of the BGZF stream. Only the current block and
//! the current record are held in memory.
//!
//! # Usage
//!
//! ```no_run
//! use bamtally::io::bam::BamReader;
//!
//! # fn main() -> bamtally::Result<()> {
//! let mut bam = BamReader::from_path("alignments.bam")?;
//!
//! println!("Header: {} references", bam.header().reference_count());
//!
//! for result in bam.records() {
//!     let record = result?;
//!     println!("{} at {}", record.name, record.position.unwrap_or(-1));
//! }
//! # Ok(())
//! # }
//! ```

use super::header::{read_header, Header};
use super::index::{BaiIndex, Chunk};
use super::record::{read_record, Record};
use super::region::{Region, ResolvedRegion};
use crate::error::Result;
use crate::io::bgzf::{BgzfReader, VirtualOffset};
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// BAM file reader.
///
/// Owns its byte source; the file handle is released when the reader is
/// dropped, including on early return after an error.
pub struct BamReader<R> {
    reader: BgzfReader<R>,
    header: Header,
    /// Reusable buffer for record data
    buffer: Vec<u8>,
}

impl<R: Read> BamReader<R> {
    /// Create a reader over BGZF-compressed BAM data.
    ///
    /// Reads and validates the header immediately.
    pub fn new(inner: R) -> Result<Self> {
        let mut reader = BgzfReader::new(inner);
        let header = read_header(&mut reader)?;
        tracing::debug!(references = header.reference_count(), "read BAM header");
        Ok(Self {
            reader,
            header,
            buffer: Vec::with_capacity(512),
        })
    }

    /// The BAM header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Virtual offset of the next record.
    pub fn virtual_offset(&self) -> VirtualOffset {
        self.reader.virtual_offset()
    }

    /// Read a single record.
    ///
    /// Returns `Ok(None)` at a clean end of file.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        read_record(&mut self.reader, &mut self.buffer)
    }

    /// Iterate over the remaining records.
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self }
    }
}

impl<R: Read + Seek> BamReader<R> {
    /// Records overlapping a region string such as `chr1:1000-2000`.
    ///
    /// # Errors
    ///
    /// `MalformedRegion` or `UnknownReference` before any I/O happens.
    pub fn query(&mut self, index: &BaiIndex, region: &str) -> Result<RegionQuery<'_, R>> {
        let region = Region::resolve_str(region, &self.header)?;
        Ok(self.query_resolved(index, region))
    }

    /// Records overlapping an already resolved region.
    pub fn query_resolved(&mut self, index: &BaiIndex, region: ResolvedRegion) -> RegionQuery<'_, R> {
        let chunks = index.query_chunks(region.reference_id, region.start, region.end);
        RegionQuery {
            reader: self,
            chunks,
            next_chunk: 0,
            chunk_end: None,
            region,
            done: false,
        }
    }
}

impl BamReader<BufReader<File>> {
    /// Open a BAM file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

/// Iterator over BAM records.
///
/// Created by [`BamReader::records()`].
pub struct Records<'a, R> {
    reader: &'a mut BamReader<R>,
}

impl<'a, R: Read> Iterator for Records<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.read_record().transpose()
    }
}

/// Records overlapping a region, found through the index.
///
/// Walks the index chunks in ascending virtual-offset order and yields
/// records on the target reference whose aligned span overlaps the region.
/// A placed record with no reference-consuming CIGAR covers one base.
/// Iteration stops early once records start past the region end.
pub struct RegionQuery<'a, R> {
    reader: &'a mut BamReader<R>,
    chunks: Vec<Chunk>,
    next_chunk: usize,
    /// End of the chunk being read; `None` before the first seek
    chunk_end: Option<VirtualOffset>,
    region: ResolvedRegion,
    done: bool,
}

impl<'a, R: Read + Seek> RegionQuery<'a, R> {
    /// The chunks this query walks.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Move to the next chunk. Returns `false` when none remain.
    fn advance_chunk(&mut self) -> Result<bool> {
        let Some(&chunk) = self.chunks.get(self.next_chunk) else {
            return Ok(false);
        };
        self.next_chunk += 1;

        // Chunks are merged and ascending; only seek forward
        let position = self.reader.virtual_offset();
        if self.chunk_end.is_none() || chunk.start > position {
            self.reader.reader.seek(chunk.start)?;
        }
        tracing::trace!(start = %chunk.start, end = %chunk.end, "reading chunk");
        self.chunk_end = Some(chunk.end);
        Ok(true)
    }

    fn next_record(&mut self) -> Result<Option<Record>> {
        loop {
            let in_chunk = self
                .chunk_end
                .is_some_and(|end| self.reader.virtual_offset() < end);
            if !in_chunk && !self.advance_chunk()? {
                return Ok(None);
            }
            if self.reader.virtual_offset() >= self.chunk_end.unwrap_or_default() {
                continue;
            }

            let record = match self.reader.read_record()? {
                Some(record) => record,
                None => {
                    // End of file inside a chunk: nothing more to read here
                    self.chunk_end = None;
                    if !self.advance_chunk()? {
                        return Ok(None);
                    }
                    continue;
                }
            };

            let (reference_id, start) = match (record.reference_id, record.position) {
                (Some(id), Some(pos)) => (id, pos as u64),
                _ => return Ok(None),
            };
            if reference_id > self.region.reference_id
                || (reference_id == self.region.reference_id && start >= self.region.end)
            {
                return Ok(None);
            }
            if reference_id != self.region.reference_id {
                continue;
            }

            let end = record.reference_end().map_or(start + 1, |end| end as u64);
            if self.region.overlaps(start, end) {
                return Ok(Some(record));
            }
        }
    }
}

impl<'a, R: Read + Seek> Iterator for RegionQuery<'a, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_record().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
