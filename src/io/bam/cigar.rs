//! CIGAR (Compact Idiosyncratic Gapped Alignment Report) operations.
//!
//! # BAM Format
//!
//! Each operation is a little-endian `u32`:
//! - Low 4 bits: operation code (0-8, `MIDNSHP=X`)
//! - High 28 bits: operation length

use crate::error::{Error, Result};

/// CIGAR operation with its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CigarOp {
    /// Match or mismatch (M)
    Match(u32),
    /// Insertion to reference (I)
    Insertion(u32),
    /// Deletion from reference (D)
    Deletion(u32),
    /// Skipped region from reference (N)
    RefSkip(u32),
    /// Soft clipping (S)
    SoftClip(u32),
    /// Hard clipping (H)
    HardClip(u32),
    /// Padding (P)
    Padding(u32),
    /// Sequence match (=)
    SeqMatch(u32),
    /// Sequence mismatch (X)
    SeqMismatch(u32),
}

impl CigarOp {
    /// Decode a packed BAM operation.
    pub fn from_packed(packed: u32) -> Result<Self> {
        let length = packed >> 4;
        let op = match packed & 0x0F {
            0 => CigarOp::Match(length),
            1 => CigarOp::Insertion(length),
            2 => CigarOp::Deletion(length),
            3 => CigarOp::RefSkip(length),
            4 => CigarOp::SoftClip(length),
            5 => CigarOp::HardClip(length),
            6 => CigarOp::Padding(length),
            7 => CigarOp::SeqMatch(length),
            8 => CigarOp::SeqMismatch(length),
            code => {
                return Err(Error::InvalidRecord(format!(
                    "invalid CIGAR operation code: {}",
                    code
                )))
            }
        };
        Ok(op)
    }

    /// Pack into the BAM `u32` representation.
    pub fn to_packed(&self) -> u32 {
        let code = match self {
            CigarOp::Match(_) => 0,
            CigarOp::Insertion(_) => 1,
            CigarOp::Deletion(_) => 2,
            CigarOp::RefSkip(_) => 3,
            CigarOp::SoftClip(_) => 4,
            CigarOp::HardClip(_) => 5,
            CigarOp::Padding(_) => 6,
            CigarOp::SeqMatch(_) => 7,
            CigarOp::SeqMismatch(_) => 8,
        };
        (self.length() << 4) | code
    }

    /// Operation length.
    pub fn length(&self) -> u32 {
        match *self {
            CigarOp::Match(len)
            | CigarOp::Insertion(len)
            | CigarOp::Deletion(len)
            | CigarOp::RefSkip(len)
            | CigarOp::SoftClip(len)
            | CigarOp::HardClip(len)
            | CigarOp::Padding(len)
            | CigarOp::SeqMatch(len)
            | CigarOp::SeqMismatch(len) => len,
        }
    }

    /// Whether the operation consumes bases of the read (M, I, S, =, X).
    pub fn consumes_query(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_)
                | CigarOp::Insertion(_)
                | CigarOp::SoftClip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }

    /// Whether the operation consumes reference positions (M, D, N, =, X).
    pub fn consumes_reference(&self) -> bool {
        matches!(
            self,
            CigarOp::Match(_)
                | CigarOp::Deletion(_)
                | CigarOp::RefSkip(_)
                | CigarOp::SeqMatch(_)
                | CigarOp::SeqMismatch(_)
        )
    }

    /// Operation type as its SAM character.
    pub fn as_char(&self) -> char {
        match self {
            CigarOp::Match(_) => 'M',
            CigarOp::Insertion(_) => 'I',
            CigarOp::Deletion(_) => 'D',
            CigarOp::RefSkip(_) => 'N',
            CigarOp::SoftClip(_) => 'S',
            CigarOp::HardClip(_) => 'H',
            CigarOp::Padding(_) => 'P',
            CigarOp::SeqMatch(_) => '=',
            CigarOp::SeqMismatch(_) => 'X',
        }
    }
}

impl std::fmt::Display for CigarOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.length(), self.as_char())
    }
}

/// Decode `n_ops` packed operations.
///
/// # Example
///
/// ```
/// use bamtally::io::bam::{decode_cigar, CigarOp};
///
/// // 100M = 100 << 4 | 0 = 0x640
/// let cigar = decode_cigar(&[0x40, 0x06, 0x00, 0x00], 1).unwrap();
/// assert_eq!(cigar, vec![CigarOp::Match(100)]);
/// ```
pub fn decode_cigar(data: &[u8], n_ops: usize) -> Result<Vec<CigarOp>> {
    let required = n_ops * 4;
    if data.len() < required {
        return Err(Error::InvalidRecord(format!(
            "insufficient CIGAR data: need {} bytes for {} operations, got {}",
            required,
            n_ops,
            data.len()
        )));
    }

    data[..required]
        .chunks_exact(4)
        .map(|b| CigarOp::from_packed(u32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect()
}

/// Append packed operations to `out`.
pub fn encode_cigar(cigar: &[CigarOp], out: &mut Vec<u8>) {
    for op in cigar {
        out.extend_from_slice(&op.to_packed().to_le_bytes());
    }
}

/// Number of read bases described by the CIGAR.
pub fn query_length(cigar: &[CigarOp]) -> u64 {
    cigar
        .iter()
        .filter(|op| op.consumes_query())
        .map(|op| op.length() as u64)
        .sum()
}

/// Number of reference positions covered by the CIGAR.
pub fn reference_length(cigar: &[CigarOp]) -> u64 {
    cigar
        .iter()
        .filter(|op| op.consumes_reference())
        .map(|op| op.length() as u64)
        .sum()
}

/// Render as a SAM CIGAR string (`*` when empty).
pub fn to_sam_string(cigar: &[CigarOp]) -> String {
    if cigar.is_empty() {
        return "*".to_string();
    }
    cigar.iter().map(|op| op.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cigar_op_char() {
        assert_eq!(CigarOp::Match(100).as_char(), 'M');
        assert_eq!(CigarOp::Insertion(5).as_char(), 'I');
        assert_eq!(CigarOp::Deletion(3).as_char(), 'D');
    }

    #[test]
    fn test_cigar_op_display() {
        assert_eq!(format!("{}", CigarOp::Match(100)), "100M");
        assert_eq!(format!("{}", CigarOp::Insertion(5)), "5I");
    }

    #[test]
    fn test_decode_multiple_operations() {
        // 50M 5I 45M
        let data = vec![
            0x20, 0x03, 0x00, 0x00, // 50M
            0x51, 0x00, 0x00, 0x00, // 5I
            0xD0, 0x02, 0x00, 0x00, // 45M
        ];
        let cigar = decode_cigar(&data, 3).unwrap();
        assert_eq!(
            cigar,
            vec![CigarOp::Match(50), CigarOp::Insertion(5), CigarOp::Match(45)]
        );
        assert_eq!(to_sam_string(&cigar), "50M5I45M");
    }

    #[test]
    fn test_all_codes_round_trip() {
        let ops = [
            CigarOp::Match(1),
            CigarOp::Insertion(2),
            CigarOp::Deletion(3),
            CigarOp::RefSkip(4),
            CigarOp::SoftClip(5),
            CigarOp::HardClip(6),
            CigarOp::Padding(7),
            CigarOp::SeqMatch(8),
            CigarOp::SeqMismatch(9),
        ];
        let mut bytes = Vec::new();
        encode_cigar(&ops, &mut bytes);
        assert_eq!(decode_cigar(&bytes, ops.len()).unwrap(), ops);
    }

    #[test]
    fn test_invalid_op_code() {
        // code 9 is undefined
        let data = 0x19u32.to_le_bytes();
        let err = decode_cigar(&data, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidRecord(_)));
    }

    #[test]
    fn test_insufficient_data() {
        assert!(decode_cigar(&[0x40, 0x06], 1).is_err());
    }

    #[test]
    fn test_query_and_reference_lengths() {
        // 5S 10M 2I 3D 10M 4H
        let cigar = vec![
            CigarOp::SoftClip(5),
            CigarOp::Match(10),
            CigarOp::Insertion(2),
            CigarOp::Deletion(3),
            CigarOp::Match(10),
            CigarOp::HardClip(4),
        ];
        assert_eq!(query_length(&cigar), 27);
        assert_eq!(reference_length(&cigar), 23);
        assert_eq!(query_length(&[]), 0);
        assert_eq!(to_sam_string(&[]), "*");
    }
}
