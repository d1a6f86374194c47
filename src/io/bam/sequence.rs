//! 4-bit BAM sequence encoding.
//!
//! BAM stores two bases per byte, high nibble first. The nibble indexes
//! into `=ACMGRSVTWYHKDBN`; an odd-length sequence pads the final low
//! nibble with zero.

use crate::error::{Error, Result};

/// BAM 4-bit to ASCII base lookup table.
const SEQ_LOOKUP: [u8; 16] = [
    b'=', b'A', b'C', b'M', // 0-3
    b'G', b'R', b'S', b'V', // 4-7
    b'T', b'W', b'Y', b'H', // 8-11
    b'K', b'D', b'B', b'N', // 12-15
];

/// The unknown-base symbol.
pub const UNKNOWN_BASE: u8 = b'N';

/// Decode a 4-bit encoded sequence to ASCII.
///
/// # Example
///
/// ```
/// use bamtally::io::bam::decode_sequence;
///
/// // 0x12 0x48 encodes A C G T
/// let sequence = decode_sequence(&[0x12, 0x48], 4).unwrap();
/// assert_eq!(sequence, b"ACGT");
/// ```
pub fn decode_sequence(data: &[u8], length: usize) -> Result<Vec<u8>> {
    let required = length.div_ceil(2);
    if data.len() < required {
        return Err(Error::InvalidRecord(format!(
            "insufficient sequence data: need {} bytes for {} bases, got {}",
            required,
            length,
            data.len()
        )));
    }

    let mut sequence = Vec::with_capacity(length);
    for &byte in &data[..length / 2] {
        sequence.push(SEQ_LOOKUP[(byte >> 4) as usize]);
        sequence.push(SEQ_LOOKUP[(byte & 0x0F) as usize]);
    }
    if length % 2 == 1 {
        sequence.push(SEQ_LOOKUP[(data[length / 2] >> 4) as usize]);
    }

    Ok(sequence)
}

/// Append the 4-bit encoding of `bases` to `out`.
///
/// Lowercase bases are encoded as their uppercase code; anything outside the
/// BAM alphabet becomes `N`.
pub fn encode_sequence(bases: &[u8], out: &mut Vec<u8>) {
    out.reserve(bases.len().div_ceil(2));
    for pair in bases.chunks(2) {
        let high = base_to_nibble(pair[0]);
        let low = pair.get(1).map_or(0, |&b| base_to_nibble(b));
        out.push((high << 4) | low);
    }
}

fn base_to_nibble(base: u8) -> u8 {
    match base.to_ascii_uppercase() {
        b'=' => 0,
        b'A' => 1,
        b'C' => 2,
        b'M' => 3,
        b'G' => 4,
        b'R' => 5,
        b'S' => 6,
        b'V' => 7,
        b'T' => 8,
        b'W' => 9,
        b'Y' => 10,
        b'H' => 11,
        b'K' => 12,
        b'D' => 13,
        b'B' => 14,
        _ => 15,
    }
}

/// Whether a non-empty sequence consists only of the unknown base.
pub fn is_all_unknown(sequence: &[u8]) -> bool {
    !sequence.is_empty() && sequence.iter().all(|&b| b == UNKNOWN_BASE)
}
