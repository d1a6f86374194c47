//! BAM record structure, decoding and encoding.
//!
//! # Binary Format
//!
//! ```text
//! BAM Record (binary, little-endian):
//! - block_size (int32): Total record size in bytes (excluding this field)
//! - refID (int32): Reference sequence ID (-1 for unmapped)
//! - pos (int32): 0-based leftmost position (-1 for unmapped)
//! - l_read_name (uint8): Length of read name (includes null terminator)
//! - mapq (uint8): Mapping quality (255 = unavailable)
//! - bin (uint16): BAI index bin
//! - n_cigar_op (uint16): Number of CIGAR operations
//! - flag (uint16): Bitwise FLAGS
//! - l_seq (int32): Sequence length
//! - next_refID (int32): Reference ID of mate/next read
//! - next_pos (int32): Position of mate/next read
//! - tlen (int32): Template length
//! - read_name (char[l_read_name]): Null-terminated read name
//! - cigar (uint32[n_cigar_op]): CIGAR operations
//! - seq (uint8[(l_seq+1)/2]): 4-bit encoded sequence
//! - qual (char[l_seq]): Phred quality scores (0xFF-filled when absent)
//! - tags: Optional tags (rest of the block)
//! ```

use super::cigar::{self, decode_cigar, encode_cigar, CigarOp};
use super::sequence::{decode_sequence, encode_sequence, is_all_unknown};
use super::tags::{decode_tags, encode_tags, Tags};
use crate::error::{Error, Result};
use crate::io::bgzf::reader::read_full;
use std::io::Read;

/// Size of the fixed-length part of a record, excluding `block_size`.
const FIXED_LEN: usize = 32;

/// FLAG bits.
pub mod flags {
    pub const PAIRED: u16 = 0x1;
    pub const PROPER_PAIR: u16 = 0x2;
    pub const UNMAPPED: u16 = 0x4;
    pub const MATE_UNMAPPED: u16 = 0x8;
    pub const REVERSE: u16 = 0x10;
    pub const MATE_REVERSE: u16 = 0x20;
    pub const FIRST_IN_PAIR: u16 = 0x40;
    pub const SECOND_IN_PAIR: u16 = 0x80;
    pub const SECONDARY: u16 = 0x100;
    pub const QC_FAIL: u16 = 0x200;
    pub const DUPLICATE: u16 = 0x400;
    pub const SUPPLEMENTARY: u16 = 0x800;
}

/// Validate reference ID: only -1 (none) and non-negative values are legal.
fn parse_reference_id(ref_id: i32, field_name: &str) -> Result<Option<usize>> {
    match ref_id {
        -1 => Ok(None),
        n if n >= 0 => Ok(Some(n as usize)),
        invalid => Err(Error::InvalidRecord(format!(
            "invalid {} reference ID: {}",
            field_name, invalid
        ))),
    }
}

fn parse_position(pos: i32, field_name: &str) -> Result<Option<i32>> {
    match pos {
        -1 => Ok(None),
        n if n >= 0 => Ok(Some(n)),
        invalid => Err(Error::InvalidRecord(format!(
            "invalid {} position: {}",
            field_name, invalid
        ))),
    }
}

/// BAM alignment record.
///
/// Owned by whoever decoded it; nothing in a record refers back into the
/// decompression buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Read name/query name
    pub name: String,

    /// Reference sequence ID (index into header.references)
    /// None when refID = -1
    pub reference_id: Option<usize>,

    /// 0-based leftmost mapping position
    /// None when pos = -1
    pub position: Option<i32>,

    /// Mapping quality (255 = unavailable)
    pub mapq: u8,

    /// BAI bin as stored in the record
    pub bin: u16,

    /// Bitwise FLAGS (see [`flags`])
    pub flags: u16,

    /// Mate/next segment reference ID
    pub mate_reference_id: Option<usize>,

    /// Mate/next segment position
    pub mate_position: Option<i32>,

    /// Template length (TLEN)
    pub template_length: i32,

    /// Sequence bases (ASCII: A, C, G, T, N, etc.)
    pub sequence: Vec<u8>,

    /// Raw Phred quality scores; all 0xFF (or empty) when unavailable
    pub quality: Vec<u8>,

    /// CIGAR operations
    pub cigar: Vec<CigarOp>,

    /// Optional tags
    pub tags: Tags,
}

impl Record {
    /// Create a new empty record.
    pub fn new() -> Self {
        Self {
            name: String::new(),
            reference_id: None,
            position: None,
            mapq: 255,
            bin: 0,
            flags: 0,
            mate_reference_id: None,
            mate_position: None,
            template_length: 0,
            sequence: Vec::new(),
            quality: Vec::new(),
            cigar: Vec::new(),
            tags: Tags::new(),
        }
    }

    pub fn is_paired(&self) -> bool {
        self.flags & flags::PAIRED != 0
    }

    pub fn is_unmapped(&self) -> bool {
        self.flags & flags::UNMAPPED != 0
    }

    pub fn is_reverse_complement(&self) -> bool {
        self.flags & flags::REVERSE != 0
    }

    pub fn is_secondary(&self) -> bool {
        self.flags & flags::SECONDARY != 0
    }

    pub fn is_qc_fail(&self) -> bool {
        self.flags & flags::QC_FAIL != 0
    }

    pub fn is_duplicate(&self) -> bool {
        self.flags & flags::DUPLICATE != 0
    }

    pub fn is_supplementary(&self) -> bool {
        self.flags & flags::SUPPLEMENTARY != 0
    }

    /// Number of query bases, i.e. `l_seq`.
    ///
    /// This is the stored sequence length, not the CIGAR query length: a
    /// record with `*` sequence has query length 0 even when it has a CIGAR.
    pub fn query_length(&self) -> usize {
        self.sequence.len()
    }

    /// Whether the sequence is non-empty and made only of `N`.
    pub fn is_all_unknown(&self) -> bool {
        is_all_unknown(&self.sequence)
    }

    /// Exclusive 0-based end of the alignment on the reference.
    ///
    /// A placed unmapped read covers one base whatever its CIGAR says, as
    /// does a record whose CIGAR consumes no reference.
    pub fn reference_end(&self) -> Option<i64> {
        let start = self.position? as i64;
        if self.is_unmapped() {
            return Some(start + 1);
        }
        let span = cigar::reference_length(&self.cigar) as i64;
        Some(start + span.max(1))
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::new()
    }
}

fn le_i32(data: &[u8], at: usize) -> i32 {
    i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn le_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

/// Split `n` bytes off the front of a record body.
fn take<'a>(body: &mut &'a [u8], n: usize, what: &str) -> Result<&'a [u8]> {
    if body.len() < n {
        return Err(Error::InvalidRecord(format!(
            "{} needs {} bytes but only {} remain in the record",
            what,
            n,
            body.len()
        )));
    }
    let (head, tail) = body.split_at(n);
    *body = tail;
    Ok(head)
}

/// Decode one record from the front of `cursor`, advancing it past the
/// record.
///
/// # Errors
///
/// - `TruncatedRecord` if fewer bytes remain than `block_size` declares
///   (the cursor is left untouched)
/// - `InvalidRecord` if the fields are inconsistent with `block_size` or
///   with each other
pub fn decode_record(cursor: &mut &[u8]) -> Result<Record> {
    let data = *cursor;
    if data.len() < 4 {
        return Err(Error::TruncatedRecord {
            expected: 4,
            actual: data.len(),
        });
    }

    let block_size = le_i32(data, 0);
    if block_size < FIXED_LEN as i32 {
        return Err(Error::InvalidRecord(format!(
            "block size {} is smaller than the fixed record fields",
            block_size
        )));
    }
    let block_size = block_size as usize;
    let available = data.len() - 4;
    if available < block_size {
        return Err(Error::TruncatedRecord {
            expected: block_size,
            actual: available,
        });
    }

    let record = decode_body(&data[4..4 + block_size])?;
    *cursor = &data[4 + block_size..];
    Ok(record)
}

fn decode_body(block: &[u8]) -> Result<Record> {
    let ref_id = le_i32(block, 0);
    let pos = le_i32(block, 4);
    let l_read_name = block[8] as usize;
    let mapq = block[9];
    let bin = le_u16(block, 10);
    let n_cigar_op = le_u16(block, 12) as usize;
    let flags = le_u16(block, 14);
    let l_seq = le_i32(block, 16);
    let next_ref_id = le_i32(block, 20);
    let next_pos = le_i32(block, 24);
    let tlen = le_i32(block, 28);

    if l_read_name == 0 {
        return Err(Error::InvalidRecord("read name length is 0".to_string()));
    }
    if l_seq < 0 {
        return Err(Error::InvalidRecord(format!(
            "invalid sequence length: {}",
            l_seq
        )));
    }
    let l_seq = l_seq as usize;

    let mut body = &block[FIXED_LEN..];

    let name_bytes = take(&mut body, l_read_name, "read name")?;
    let (&last, name_bytes) = name_bytes
        .split_last()
        .ok_or_else(|| Error::InvalidRecord("empty read name field".to_string()))?;
    if last != 0 || name_bytes.contains(&0) {
        return Err(Error::InvalidRecord(
            "read name is not a single NUL-terminated string".to_string(),
        ));
    }
    let name = String::from_utf8(name_bytes.to_vec())
        .map_err(|e| Error::InvalidRecord(format!("invalid UTF-8 in read name: {}", e)))?;

    let cigar_bytes = take(&mut body, n_cigar_op * 4, "CIGAR")?;
    let cigar = decode_cigar(cigar_bytes, n_cigar_op)?;

    let seq_bytes = take(&mut body, l_seq.div_ceil(2), "sequence")?;
    let sequence = decode_sequence(seq_bytes, l_seq)?;

    let quality = take(&mut body, l_seq, "quality")?.to_vec();

    let tags = decode_tags(body)?;

    // Unmapped reads may carry a stale CIGAR
    let unmapped = flags & self::flags::UNMAPPED != 0;
    if !unmapped && !cigar.is_empty() && l_seq > 0 {
        let cigar_query_length = cigar::query_length(&cigar);
        if cigar_query_length != l_seq as u64 {
            return Err(Error::InvalidRecord(format!(
                "read {}: CIGAR {} covers {} query bases but the sequence has {}",
                name,
                cigar::to_sam_string(&cigar),
                cigar_query_length,
                l_seq
            )));
        }
    }

    Ok(Record {
        name,
        reference_id: parse_reference_id(ref_id, "read")?,
        position: parse_position(pos, "read")?,
        mapq,
        bin,
        flags,
        mate_reference_id: parse_reference_id(next_ref_id, "mate")?,
        mate_position: parse_position(next_pos, "mate")?,
        template_length: tlen,
        sequence,
        quality,
        cigar,
        tags,
    })
}

/// Append the binary encoding of `record`, including `block_size`, to `out`.
///
/// For records produced by [`decode_record`] the output matches the input
/// bytes, provided the unused low nibble of an odd-length sequence was zero.
pub fn encode_record(record: &Record, out: &mut Vec<u8>) -> Result<()> {
    let l_read_name = record.name.len() + 1;
    if l_read_name > u8::MAX as usize {
        return Err(Error::InvalidRecord(format!(
            "read name of {} bytes is too long",
            record.name.len()
        )));
    }
    if record.name.as_bytes().contains(&0) {
        return Err(Error::InvalidRecord("read name contains NUL".to_string()));
    }
    if record.cigar.len() > u16::MAX as usize {
        return Err(Error::InvalidRecord(format!(
            "{} CIGAR operations exceed the record limit",
            record.cigar.len()
        )));
    }
    let l_seq = record.sequence.len();
    if !record.quality.is_empty() && record.quality.len() != l_seq {
        return Err(Error::InvalidRecord(format!(
            "quality length {} does not match sequence length {}",
            record.quality.len(),
            l_seq
        )));
    }

    let start = out.len();
    out.extend_from_slice(&[0; 4]); // block_size, patched below
    out.extend_from_slice(&record.reference_id.map_or(-1, |id| id as i32).to_le_bytes());
    out.extend_from_slice(&record.position.unwrap_or(-1).to_le_bytes());
    out.push(l_read_name as u8);
    out.push(record.mapq);
    out.extend_from_slice(&record.bin.to_le_bytes());
    out.extend_from_slice(&(record.cigar.len() as u16).to_le_bytes());
    out.extend_from_slice(&record.flags.to_le_bytes());
    out.extend_from_slice(&(l_seq as i32).to_le_bytes());
    out.extend_from_slice(
        &record
            .mate_reference_id
            .map_or(-1, |id| id as i32)
            .to_le_bytes(),
    );
    out.extend_from_slice(&record.mate_position.unwrap_or(-1).to_le_bytes());
    out.extend_from_slice(&record.template_length.to_le_bytes());

    out.extend_from_slice(record.name.as_bytes());
    out.push(0);
    encode_cigar(&record.cigar, out);
    encode_sequence(&record.sequence, out);
    if record.quality.is_empty() {
        out.resize(out.len() + l_seq, 0xFF);
    } else {
        out.extend_from_slice(&record.quality);
    }
    encode_tags(&record.tags, out);

    let block_size = (out.len() - start - 4) as i32;
    out[start..start + 4].copy_from_slice(&block_size.to_le_bytes());
    Ok(())
}

/// Read a single record from a byte stream.
///
/// `buf` is scratch space reused between calls.
///
/// # Returns
///
/// - `Ok(Some(record))` - Successfully read a record
/// - `Ok(None)` - Clean end of stream before a new record
/// - `Err(TruncatedRecord)` - Stream ended inside a record
pub fn read_record<R: Read>(reader: &mut R, buf: &mut Vec<u8>) -> Result<Option<Record>> {
    let mut size_bytes = [0u8; 4];
    let n = read_full(reader, &mut size_bytes)?;
    if n == 0 {
        return Ok(None);
    }
    if n < 4 {
        return Err(Error::TruncatedRecord {
            expected: 4,
            actual: n,
        });
    }

    let block_size = i32::from_le_bytes(size_bytes);
    if block_size < FIXED_LEN as i32 {
        return Err(Error::InvalidRecord(format!(
            "block size {} is smaller than the fixed record fields",
            block_size
        )));
    }
    let block_size = block_size as usize;

    // Grow with the bytes actually present, not with the declared size
    buf.clear();
    reader.by_ref().take(block_size as u64).read_to_end(buf)?;
    if buf.len() < block_size {
        return Err(Error::TruncatedRecord {
            expected: block_size,
            actual: buf.len(),
        });
    }

    decode_body(buf).map(Some)
}
