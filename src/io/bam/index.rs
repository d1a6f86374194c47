//! BAI (BAM Index) reading, querying and building.
//!
//! # Format
//!
//! ```text
//! magic "BAI\1"
//! n_ref (int32)
//! per reference:
//!   n_bin (int32)
//!   per bin: bin (uint32), n_chunk (int32), n_chunk x (beg, end) virtual offsets
//!   n_intv (int32), n_intv x ioffset (uint64)   16 kbp linear index
//! n_no_coor (uint64, optional)
//! ```
//!
//! Bin 37450 is a pseudo-bin holding per-reference metadata rather than
//! chunks: the virtual-offset span of the reference's records and its
//! mapped/unmapped read counts.
//!
//! # Binning
//!
//! A half-open interval `[beg, end)` falls in the smallest of 6 nested bin
//! levels (512 Mbp down to 16 kbp) that contains it. A region query gathers
//! every bin that could hold an overlapping record, drops chunks that end
//! before the linear index says the region can start, then sorts and merges
//! what is left.

use super::header::Header;
use super::reader::BamReader;
use super::record::Record;
use super::region::Region;
use crate::error::{Error, Result};
use crate::io::bgzf::reader::read_full;
use crate::io::bgzf::VirtualOffset;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const BAI_MAGIC: &[u8; 4] = b"BAI\x01";

/// Pseudo-bin carrying reference metadata.
pub const METADATA_BIN: u32 = 37450;

/// Linear index window size, as a shift (16 kbp).
pub const LINEAR_SHIFT: u32 = 14;

/// Largest coordinate the BAI binning scheme addresses (2^29).
pub const MAX_COORDINATE: u64 = 1 << 29;

/// Range of virtual offsets `[start, end)` holding candidate records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Chunk {
    pub start: VirtualOffset,
    pub end: VirtualOffset,
}

impl Chunk {
    pub fn new(start: VirtualOffset, end: VirtualOffset) -> Self {
        Chunk { start, end }
    }
}

/// A bin and the chunks stored under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    pub id: u32,
    pub chunks: Vec<Chunk>,
}

impl Bin {
    pub fn new(id: u32) -> Self {
        Bin {
            id,
            chunks: Vec::new(),
        }
    }
}

/// Contents of the metadata pseudo-bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceMetadata {
    /// Virtual offset of the first record on the reference
    pub start: VirtualOffset,
    /// Virtual offset just past the last record on the reference
    pub end: VirtualOffset,
    pub mapped: u64,
    pub unmapped: u64,
}

/// Index data for one reference sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceIndex {
    /// Bins in file order (ascending id when built here)
    pub bins: Vec<Bin>,
    /// Smallest record start offset per 16 kbp window
    pub intervals: Vec<VirtualOffset>,
    pub metadata: Option<ReferenceMetadata>,
}

impl ReferenceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest virtual offset at which a record overlapping `start` can
    /// begin, from the linear index.
    ///
    /// Positions past the last window use the last window.
    pub fn min_offset(&self, start: u64) -> VirtualOffset {
        let window = (start >> LINEAR_SHIFT) as usize;
        match self.intervals.get(window) {
            Some(&offset) => offset,
            None => self.intervals.last().copied().unwrap_or_default(),
        }
    }
}

/// A complete BAI index.
///
/// Read once and then shared read-only between queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaiIndex {
    pub references: Vec<ReferenceIndex>,
    /// Number of unplaced reads, when the index records it
    pub n_no_coor: Option<u64>,
}

fn truncated(what: &str) -> Error {
    Error::InvalidIndex(format!("truncated {}", what))
}

fn read_exact_or<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            truncated(what)
        } else {
            Error::from(e)
        }
    })
}

fn read_i32_le<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    let mut buf = [0u8; 4];
    read_exact_or(reader, &mut buf, what)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_u32_le<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    read_exact_or(reader, &mut buf, what)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64_le<R: Read>(reader: &mut R, what: &str) -> Result<u64> {
    let mut buf = [0u8; 8];
    read_exact_or(reader, &mut buf, what)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_count<R: Read>(reader: &mut R, what: &str) -> Result<usize> {
    let n = read_i32_le(reader, what)?;
    if n < 0 {
        return Err(Error::InvalidIndex(format!("negative {}: {}", what, n)));
    }
    Ok(n as usize)
}

impl BaiIndex {
    /// Load an index from a file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use bamtally::io::bam::BaiIndex;
    ///
    /// # fn main() -> bamtally::Result<()> {
    /// let index = BaiIndex::from_path("alignments.bam.bai")?;
    /// println!("Index covers {} references", index.references.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read(&mut reader)
    }

    /// Decode an index from a byte stream.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 4];
        read_exact_or(reader, &mut magic, "magic")?;
        if &magic != BAI_MAGIC {
            return Err(Error::InvalidIndex(format!(
                "invalid BAI magic: expected {:?}, got {:?}",
                BAI_MAGIC, magic
            )));
        }

        let n_ref = read_count(reader, "reference count")?;
        let mut references = Vec::with_capacity(n_ref.min(1024));
        for i in 0..n_ref {
            let reference = Self::read_reference_index(reader).map_err(|e| match e {
                Error::InvalidIndex(msg) => Error::InvalidIndex(format!("reference {}: {}", i, msg)),
                other => other,
            })?;
            references.push(reference);
        }

        // n_no_coor is optional; a partial value is still corruption
        let mut buf = [0u8; 8];
        let n_no_coor = match read_full(reader, &mut buf)? {
            0 => None,
            8 => Some(u64::from_le_bytes(buf)),
            _ => return Err(truncated("unplaced read count")),
        };

        Ok(BaiIndex {
            references,
            n_no_coor,
        })
    }

    fn read_reference_index<R: Read>(reader: &mut R) -> Result<ReferenceIndex> {
        let n_bin = read_count(reader, "bin count")?;
        let mut bins = Vec::with_capacity(n_bin.min(4096));
        let mut metadata = None;

        for _ in 0..n_bin {
            let id = read_u32_le(reader, "bin id")?;
            let n_chunk = read_count(reader, "chunk count")?;

            let mut chunks = Vec::with_capacity(n_chunk.min(4096));
            for _ in 0..n_chunk {
                let start = VirtualOffset::from_raw(read_u64_le(reader, "chunk start")?);
                let end = VirtualOffset::from_raw(read_u64_le(reader, "chunk end")?);
                chunks.push(Chunk::new(start, end));
            }

            if id == METADATA_BIN {
                if chunks.len() != 2 {
                    return Err(Error::InvalidIndex(format!(
                        "metadata bin has {} chunks, expected 2",
                        chunks.len()
                    )));
                }
                metadata = Some(ReferenceMetadata {
                    start: chunks[0].start,
                    end: chunks[0].end,
                    mapped: chunks[1].start.as_raw(),
                    unmapped: chunks[1].end.as_raw(),
                });
            } else if id > METADATA_BIN {
                return Err(Error::InvalidIndex(format!("bin id {} out of range", id)));
            } else {
                bins.push(Bin { id, chunks });
            }
        }

        let n_intv = read_count(reader, "interval count")?;
        let mut intervals = Vec::with_capacity(n_intv.min(1 << 15));
        for _ in 0..n_intv {
            intervals.push(VirtualOffset::from_raw(read_u64_le(reader, "interval")?));
        }

        Ok(ReferenceIndex {
            bins,
            intervals,
            metadata,
        })
    }

    /// Write the index in BAI format.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(BAI_MAGIC)?;
        writer.write_all(&(self.references.len() as i32).to_le_bytes())?;

        for reference in &self.references {
            let n_bin = reference.bins.len() + usize::from(reference.metadata.is_some());
            writer.write_all(&(n_bin as i32).to_le_bytes())?;

            for bin in &reference.bins {
                writer.write_all(&bin.id.to_le_bytes())?;
                writer.write_all(&(bin.chunks.len() as i32).to_le_bytes())?;
                for chunk in &bin.chunks {
                    writer.write_all(&chunk.start.as_raw().to_le_bytes())?;
                    writer.write_all(&chunk.end.as_raw().to_le_bytes())?;
                }
            }

            if let Some(meta) = &reference.metadata {
                writer.write_all(&METADATA_BIN.to_le_bytes())?;
                writer.write_all(&2i32.to_le_bytes())?;
                for value in [meta.start.as_raw(), meta.end.as_raw(), meta.mapped, meta.unmapped] {
                    writer.write_all(&value.to_le_bytes())?;
                }
            }

            writer.write_all(&(reference.intervals.len() as i32).to_le_bytes())?;
            for offset in &reference.intervals {
                writer.write_all(&offset.as_raw().to_le_bytes())?;
            }
        }

        if let Some(n) = self.n_no_coor {
            writer.write_all(&n.to_le_bytes())?;
        }
        Ok(())
    }

    /// Write the index to a file.
    pub fn to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Chunks that may hold records overlapping `[start, end)` on a
    /// reference, sorted by start offset with overlaps merged.
    ///
    /// A reference the index has no entry for yields no chunks.
    pub fn query_chunks(&self, reference_id: usize, start: u64, end: u64) -> Vec<Chunk> {
        let reference = match self.references.get(reference_id) {
            Some(reference) => reference,
            None => return Vec::new(),
        };

        let candidates = reg2bins(start, end);
        let min_offset = reference.min_offset(start);

        let chunks: Vec<Chunk> = reference
            .bins
            .iter()
            .filter(|bin| candidates.binary_search(&bin.id).is_ok())
            .flat_map(|bin| bin.chunks.iter().copied())
            .filter(|chunk| chunk.end > min_offset)
            .collect();

        let merged = merge_chunks(chunks);
        tracing::debug!(
            reference_id,
            start,
            end,
            %min_offset,
            chunks = merged.len(),
            "index query"
        );
        merged
    }

    /// Resolve a region string against `header` and return its chunks.
    ///
    /// # Errors
    ///
    /// `MalformedRegion` if the string does not parse and
    /// `UnknownReference` if the header lacks the reference.
    pub fn query(&self, header: &Header, region: &str) -> Result<Vec<Chunk>> {
        let region = Region::resolve_str(region, header)?;
        Ok(self.query_chunks(region.reference_id, region.start, region.end))
    }
}

/// Smallest bin containing the 0-based half-open interval `[beg, end)`.
pub fn reg2bin(beg: u64, end: u64) -> u32 {
    let end = end.max(beg + 1) - 1;
    let mut shift = LINEAR_SHIFT;
    let mut offset = ((1u64 << 15) - 1) / 7;
    while shift < 29 {
        if beg >> shift == end >> shift {
            return (offset + (beg >> shift)) as u32;
        }
        shift += 3;
        offset = (offset - 1) / 8;
    }
    0
}

/// Ascending list of every bin that may overlap `[beg, end)`.
pub fn reg2bins(beg: u64, end: u64) -> Vec<u32> {
    let end = end.min(MAX_COORDINATE);
    if beg >= end {
        return Vec::new();
    }
    let end = end - 1;

    let mut bins = vec![0];
    // Level offsets 1, 9, 73, 585, 4681 with shifts 26 down to 14
    let mut offset = 1u64;
    let mut shift = 26;
    while shift >= LINEAR_SHIFT {
        for bin in (offset + (beg >> shift))..=(offset + (end >> shift)) {
            bins.push(bin as u32);
        }
        offset = offset * 8 + 1;
        shift -= 3;
    }
    bins
}

/// Sort chunks by start and merge those that overlap or touch.
pub fn merge_chunks(mut chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks.sort_unstable();

    let mut merged: Vec<Chunk> = Vec::with_capacity(chunks.len());
    for chunk in chunks {
        match merged.last_mut() {
            Some(current) if chunk.start <= current.end => {
                current.end = current.end.max(chunk.end);
            }
            _ => merged.push(chunk),
        }
    }
    merged
}

#[derive(Debug, Default)]
struct ReferenceBuilder {
    bins: BTreeMap<u32, Vec<Chunk>>,
    /// Linear index; `None` for windows no record has touched yet
    intervals: Vec<Option<VirtualOffset>>,
    metadata: Option<ReferenceMetadata>,
}

impl ReferenceBuilder {
    fn add(&mut self, record: &Record, beg: u64, end: u64, chunk: Chunk) {
        let chunks = self.bins.entry(reg2bin(beg, end)).or_default();
        match chunks.last_mut() {
            Some(last) if last.end == chunk.start => last.end = chunk.end,
            _ => chunks.push(chunk),
        }

        let first = (beg >> LINEAR_SHIFT) as usize;
        let last = ((end - 1) >> LINEAR_SHIFT) as usize;
        if self.intervals.len() <= last {
            self.intervals.resize(last + 1, None);
        }
        for slot in &mut self.intervals[first..=last] {
            slot.get_or_insert(chunk.start);
        }

        let meta = self.metadata.get_or_insert(ReferenceMetadata {
            start: chunk.start,
            end: chunk.end,
            mapped: 0,
            unmapped: 0,
        });
        meta.end = chunk.end;
        if record.is_unmapped() {
            meta.unmapped += 1;
        } else {
            meta.mapped += 1;
        }
    }

    fn finish(self) -> ReferenceIndex {
        // Untouched windows inherit the previous window's offset
        let mut previous = VirtualOffset::default();
        let intervals = self
            .intervals
            .into_iter()
            .map(|slot| {
                let offset = slot.unwrap_or(previous);
                previous = offset;
                offset
            })
            .collect();

        ReferenceIndex {
            bins: self
                .bins
                .into_iter()
                .map(|(id, chunks)| Bin { id, chunks })
                .collect(),
            intervals,
            metadata: self.metadata,
        }
    }
}

/// Builds a [`BaiIndex`] from the records of a coordinate-sorted BAM.
///
/// Feed every record with the virtual offsets just before and just after
/// it, in file order.
#[derive(Debug)]
pub struct IndexBuilder {
    references: Vec<ReferenceBuilder>,
    /// (reference, position) of the previous placed record
    last: Option<(usize, u64)>,
    seen_unplaced: bool,
    n_no_coor: u64,
}

impl IndexBuilder {
    /// Create a builder for a header with `n_references` references.
    pub fn new(n_references: usize) -> Self {
        IndexBuilder {
            references: (0..n_references).map(|_| ReferenceBuilder::default()).collect(),
            last: None,
            seen_unplaced: false,
            n_no_coor: 0,
        }
    }

    /// Add one record located at `[start, end)` in the BGZF stream.
    ///
    /// # Errors
    ///
    /// `InvalidIndex` if the record is out of coordinate order or names a
    /// reference the header does not have.
    pub fn add_record(
        &mut self,
        record: &Record,
        start: VirtualOffset,
        end: VirtualOffset,
    ) -> Result<()> {
        let (reference_id, position) = match (record.reference_id, record.position) {
            (Some(id), Some(pos)) => (id, pos as u64),
            _ => {
                self.seen_unplaced = true;
                self.n_no_coor += 1;
                return Ok(());
            }
        };

        if self.seen_unplaced {
            return Err(Error::InvalidIndex(format!(
                "record {} is placed after unplaced records; BAM is not coordinate-sorted",
                record.name
            )));
        }
        if let Some(last) = self.last {
            if (reference_id, position) < last {
                return Err(Error::InvalidIndex(format!(
                    "record {} at {}:{} follows {}:{}; BAM is not coordinate-sorted",
                    record.name, reference_id, position, last.0, last.1
                )));
            }
        }
        let count = self.references.len();
        let reference = self.references.get_mut(reference_id).ok_or_else(|| {
            Error::InvalidIndex(format!(
                "record {} names reference {} but the header has {}",
                record.name, reference_id, count
            ))
        })?;

        let end_pos = record
            .reference_end()
            .map_or(position + 1, |end| end as u64)
            .min(MAX_COORDINATE);
        if position >= MAX_COORDINATE {
            return Err(Error::InvalidIndex(format!(
                "record {} at position {} is beyond the BAI coordinate limit",
                record.name, position
            )));
        }

        reference.add(record, position, end_pos, Chunk::new(start, end));
        self.last = Some((reference_id, position));
        Ok(())
    }

    /// Finish and return the index.
    pub fn build(self) -> BaiIndex {
        BaiIndex {
            references: self
                .references
                .into_iter()
                .map(ReferenceBuilder::finish)
                .collect(),
            n_no_coor: Some(self.n_no_coor),
        }
    }
}

/// Index every record readable from `reader`.
///
/// The reader must be positioned at the first record, i.e. freshly opened.
pub fn build_index<R: Read>(reader: &mut BamReader<R>) -> Result<BaiIndex> {
    let mut builder = IndexBuilder::new(reader.header().reference_count());
    let mut records = 0u64;

    loop {
        let start = reader.virtual_offset();
        let record = match reader.read_record()? {
            Some(record) => record,
            None => break,
        };
        let end = reader.virtual_offset();
        builder.add_record(&record, start, end)?;
        records += 1;
    }

    tracing::debug!(records, "built BAI index");
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bam::cigar::CigarOp;
    use crate::io::bam::header::Reference;
    use std::io::Cursor;

    fn vo(compressed: u64, within: u16) -> VirtualOffset {
        VirtualOffset::new(compressed, within)
    }

    fn placed(name: &str, reference_id: usize, pos: i32, len: u32) -> Record {
        let mut record = Record::new();
        record.name = name.to_string();
        record.reference_id = Some(reference_id);
        record.position = Some(pos);
        record.cigar = vec![CigarOp::Match(len)];
        record.sequence = vec![b'A'; len as usize];
        record
    }

    #[test]
    fn test_reg2bin_levels() {
        assert_eq!(reg2bin(0, 1), 4681);
        assert_eq!(reg2bin(16_383, 16_384), 4681);
        assert_eq!(reg2bin(16_384, 16_385), 4682);
        // Crosses a 16 kbp boundary but not a 128 kbp one
        assert_eq!(reg2bin(16_000, 17_000), 585);
        assert_eq!(reg2bin(0, MAX_COORDINATE), 0);
    }

    #[test]
    fn test_reg2bins_small_region() {
        let bins = reg2bins(119, 160);
        assert_eq!(bins, vec![0, 1, 9, 73, 585, 4681]);
    }

    #[test]
    fn test_reg2bins_spans_windows() {
        let bins = reg2bins(16_000, 33_000);
        assert!(bins.contains(&4681));
        assert!(bins.contains(&4682));
        assert!(bins.contains(&4683));
        assert!(bins.windows(2).all(|w| w[0] < w[1]));
        assert!(reg2bins(100, 100).is_empty());
    }

    #[test]
    fn test_reg2bins_contains_reg2bin() {
        for &(beg, end) in &[(0u64, 10u64), (1_000_000, 1_200_000), (5, 200_000_000)] {
            assert!(reg2bins(beg, end).contains(&reg2bin(beg, end)));
        }
    }

    #[test]
    fn test_merge_chunks() {
        let chunks = vec![
            Chunk::new(vo(300, 0), vo(400, 0)),
            Chunk::new(vo(100, 0), vo(200, 0)),
            Chunk::new(vo(150, 0), vo(250, 0)),
            Chunk::new(vo(400, 0), vo(450, 0)),
        ];
        assert_eq!(
            merge_chunks(chunks),
            vec![
                Chunk::new(vo(100, 0), vo(250, 0)),
                Chunk::new(vo(300, 0), vo(450, 0)),
            ]
        );
    }

    fn two_bin_index(a: Chunk, b: Chunk) -> BaiIndex {
        // A read at 100-200 sits in bin 4681; one at 150-300 is stored
        // under a coarser bin, as happens for reads from an earlier window
        BaiIndex {
            references: vec![ReferenceIndex {
                bins: vec![
                    Bin { id: 4681, chunks: vec![b] },
                    Bin { id: 585, chunks: vec![a] },
                ],
                intervals: vec![vo(0, 0)],
                metadata: None,
            }],
            n_no_coor: None,
        }
    }

    #[test]
    fn test_query_returns_both_bins_ascending() {
        let a = Chunk::new(vo(1_000, 0), vo(1_000, 400));
        let b = Chunk::new(vo(5_000, 0), vo(5_000, 300));
        let index = two_bin_index(a, b);

        assert_eq!(index.query_chunks(0, 119, 160), vec![a, b]);
    }

    #[test]
    fn test_query_merges_overlapping_bins() {
        let a = Chunk::new(vo(1_000, 0), vo(1_000, 400));
        let b = Chunk::new(vo(1_000, 200), vo(2_000, 10));
        let index = two_bin_index(a, b);

        assert_eq!(
            index.query_chunks(0, 119, 160),
            vec![Chunk::new(vo(1_000, 0), vo(2_000, 10))]
        );
    }

    #[test]
    fn test_query_applies_linear_index() {
        let early = Chunk::new(vo(100, 0), vo(200, 0));
        let late = Chunk::new(vo(900, 0), vo(1_000, 0));
        let index = BaiIndex {
            references: vec![ReferenceIndex {
                bins: vec![Bin {
                    id: 0,
                    chunks: vec![early, late],
                }],
                intervals: vec![vo(100, 0), vo(900, 0)],
                metadata: None,
            }],
            n_no_coor: None,
        };

        // Second window starts at 900; the early chunk cannot overlap
        assert_eq!(index.query_chunks(0, 20_000, 21_000), vec![late]);
        assert_eq!(index.query_chunks(0, 0, 100), vec![early, late]);
        assert!(index.query_chunks(5, 0, 100).is_empty());
    }

    #[test]
    fn test_query_by_region_string() {
        let a = Chunk::new(vo(1_000, 0), vo(1_000, 400));
        let b = Chunk::new(vo(5_000, 0), vo(5_000, 300));
        let index = two_bin_index(a, b);
        let header = Header::new("", vec![Reference::new("chr1", 100_000)]);

        assert_eq!(index.query(&header, "chr1:120-160").unwrap(), vec![a, b]);
        assert!(matches!(
            index.query(&header, "chr2:120-160"),
            Err(Error::UnknownReference(_))
        ));
        assert!(matches!(
            index.query(&header, "chr1:160-120"),
            Err(Error::MalformedRegion { .. })
        ));
    }

    #[test]
    fn test_builder_then_write_then_read() {
        let mut builder = IndexBuilder::new(2);
        builder
            .add_record(&placed("r1", 0, 100, 50), vo(0, 10), vo(0, 90))
            .unwrap();
        builder
            .add_record(&placed("r2", 0, 120, 50), vo(0, 90), vo(0, 170))
            .unwrap();
        builder
            .add_record(&placed("r3", 0, 40_000, 50), vo(0, 170), vo(500, 20))
            .unwrap();
        let mut unplaced = Record::new();
        unplaced.name = "u".to_string();
        unplaced.flags = crate::io::bam::record::flags::UNMAPPED;
        builder.add_record(&unplaced, vo(500, 20), vo(500, 60)).unwrap();

        let index = builder.build();
        let reference = &index.references[0];
        // r1 and r2 share bin 4681 and are contiguous: one chunk
        assert_eq!(
            reference.bins[0],
            Bin {
                id: 4681,
                chunks: vec![Chunk::new(vo(0, 10), vo(0, 170))]
            }
        );
        assert_eq!(reference.intervals.len(), 3);
        // Window 1 saw no records and inherits window 0
        assert_eq!(reference.intervals[1], vo(0, 10));
        assert_eq!(reference.intervals[2], vo(0, 170));
        assert_eq!(
            reference.metadata,
            Some(ReferenceMetadata {
                start: vo(0, 10),
                end: vo(500, 20),
                mapped: 3,
                unmapped: 0
            })
        );
        assert_eq!(index.references[1], ReferenceIndex::default());
        assert_eq!(index.n_no_coor, Some(1));

        let mut bytes = Vec::new();
        index.write(&mut bytes).unwrap();
        let parsed = BaiIndex::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, index);

        assert_eq!(
            parsed.query_chunks(0, 40_010, 40_020),
            vec![Chunk::new(vo(0, 170), vo(500, 20))]
        );
    }

    #[test]
    fn test_builder_rejects_unsorted_input() {
        let mut builder = IndexBuilder::new(1);
        builder
            .add_record(&placed("r1", 0, 500, 10), vo(0, 0), vo(0, 50))
            .unwrap();
        let err = builder
            .add_record(&placed("r2", 0, 100, 10), vo(0, 50), vo(0, 100))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(_)));
    }

    #[test]
    fn test_builder_rejects_unknown_reference() {
        let mut builder = IndexBuilder::new(1);
        let err = builder
            .add_record(&placed("r1", 3, 500, 10), vo(0, 0), vo(0, 50))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(_)));
    }

    #[test]
    fn test_read_without_n_no_coor() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BAI\x01");
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&0i32.to_le_bytes()); // n_bin
        bytes.extend_from_slice(&0i32.to_le_bytes()); // n_intv

        let index = BaiIndex::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(index.references.len(), 1);
        assert_eq!(index.n_no_coor, None);
    }

    #[test]
    fn test_read_rejects_bad_magic_and_truncation() {
        assert!(matches!(
            BaiIndex::read(&mut Cursor::new(b"CSI\x01".to_vec())),
            Err(Error::InvalidIndex(_))
        ));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"BAI\x01");
        bytes.extend_from_slice(&1i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes()); // one bin, then nothing
        assert!(matches!(
            BaiIndex::read(&mut Cursor::new(bytes)),
            Err(Error::InvalidIndex(_))
        ));
    }
}
