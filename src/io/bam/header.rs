//! BAM header parsing and writing.
//!
//! # Format
//!
//! ```text
//! BAM Header:
//! - 4 bytes: Magic ("BAM\1")
//! - 4 bytes: SAM header text length (l_text, int32)
//! - l_text bytes: SAM header text
//! - 4 bytes: Number of reference sequences (n_ref, int32)
//! - For each reference:
//!   - 4 bytes: Reference name length (l_name, int32, includes null terminator)
//!   - l_name bytes: Reference name (null-terminated)
//!   - 4 bytes: Reference length (int32)
//! ```

use crate::error::{Error, Result};
use std::io::{self, Read, Write};

/// BAM magic bytes.
const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Reference sequence information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Reference sequence name (e.g., "chr1", "chrM")
    pub name: String,
    /// Reference sequence length in bases
    pub length: u32,
}

impl Reference {
    /// Create a new reference.
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self {
            name: name.into(),
            length,
        }
    }
}

/// BAM file header.
///
/// Contains SAM header text and the reference dictionary. Index files carry
/// no reference names, so region strings are always resolved through here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// SAM header text (includes @HD, @SQ, @RG, @PG lines)
    pub text: String,
    /// Reference sequences (chromosomes/contigs)
    pub references: Vec<Reference>,
}

impl Header {
    /// Create a new header.
    pub fn new(text: impl Into<String>, references: Vec<Reference>) -> Self {
        Self {
            text: text.into(),
            references,
        }
    }

    /// Get reference by ID.
    pub fn reference(&self, id: usize) -> Option<&Reference> {
        self.references.get(id)
    }

    /// Get reference name by ID.
    pub fn reference_name(&self, id: usize) -> Option<&str> {
        self.reference(id).map(|r| r.name.as_str())
    }

    /// Resolve a reference name to its ID.
    pub fn reference_id(&self, name: &str) -> Option<usize> {
        self.references.iter().position(|r| r.name == name)
    }

    /// Get number of reference sequences.
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }
}

/// `read_exact` that reports a short read as a truncated header.
fn read_field<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            Error::InvalidHeader(format!("truncated {}", what))
        } else {
            Error::from(e)
        }
    })
}

fn read_i32<R: Read>(reader: &mut R, what: &str) -> Result<i32> {
    let mut bytes = [0u8; 4];
    read_field(reader, &mut bytes, what)?;
    Ok(i32::from_le_bytes(bytes))
}

/// Read and validate BAM magic bytes.
pub fn read_magic<R: Read>(reader: &mut R) -> Result<()> {
    let mut magic = [0u8; 4];
    read_field(reader, &mut magic, "magic")?;

    if &magic != BAM_MAGIC {
        return Err(Error::InvalidHeader(format!(
            "invalid BAM magic: expected {:?}, got {:?}",
            BAM_MAGIC, magic
        )));
    }

    Ok(())
}

/// Read SAM header text.
///
/// Trailing NUL padding, which some writers add, is stripped.
pub fn read_header_text<R: Read>(reader: &mut R) -> Result<String> {
    let len = read_i32(reader, "header text length")?;
    if len < 0 {
        return Err(Error::InvalidHeader(format!(
            "invalid SAM header length: {}",
            len
        )));
    }

    let mut text_bytes = vec![0u8; len as usize];
    read_field(reader, &mut text_bytes, "header text")?;
    while text_bytes.last() == Some(&0) {
        text_bytes.pop();
    }

    String::from_utf8(text_bytes)
        .map_err(|e| Error::InvalidHeader(format!("invalid UTF-8 in SAM header: {}", e)))
}

/// Read a single reference sequence.
pub fn read_reference<R: Read>(reader: &mut R) -> Result<Reference> {
    let name_len = read_i32(reader, "reference name length")?;
    if name_len <= 0 {
        return Err(Error::InvalidHeader(format!(
            "invalid reference name length: {}",
            name_len
        )));
    }

    let mut name_bytes = vec![0u8; name_len as usize];
    read_field(reader, &mut name_bytes, "reference name")?;

    if name_bytes.pop() != Some(0) {
        return Err(Error::InvalidHeader(
            "reference name not null-terminated".to_string(),
        ));
    }

    let name = String::from_utf8(name_bytes)
        .map_err(|e| Error::InvalidHeader(format!("invalid UTF-8 in reference name: {}", e)))?;

    let length = read_i32(reader, "reference length")?;
    if length < 0 {
        return Err(Error::InvalidHeader(format!(
            "invalid length {} for reference {}",
            length, name
        )));
    }

    Ok(Reference::new(name, length as u32))
}

/// Read the reference dictionary.
pub fn read_references<R: Read>(reader: &mut R) -> Result<Vec<Reference>> {
    let count = read_i32(reader, "reference count")?;
    if count < 0 {
        return Err(Error::InvalidHeader(format!(
            "invalid reference count: {}",
            count
        )));
    }

    // Cap the preallocation; a corrupt count must not trigger a huge allocation
    let mut references = Vec::with_capacity((count as usize).min(1024));
    for i in 0..count {
        let reference = read_reference(reader).map_err(|e| match e {
            Error::InvalidHeader(msg) => {
                Error::InvalidHeader(format!("reference {}: {}", i, msg))
            }
            other => other,
        })?;
        references.push(reference);
    }

    Ok(references)
}

/// Read complete BAM header.
///
/// # Example
///
/// ```no_run
/// use bamtally::io::bam::read_header;
/// use bamtally::io::bgzf::BgzfReader;
///
/// # fn main() -> bamtally::Result<()> {
/// let mut reader = BgzfReader::from_path("alignments.bam")?;
/// let header = read_header(&mut reader)?;
///
/// for (i, reference) in header.references.iter().enumerate() {
///     println!("{}: {} ({} bp)", i, reference.name, reference.length);
/// }
/// # Ok(())
/// # }
/// ```
pub fn read_header<R: Read>(reader: &mut R) -> Result<Header> {
    read_magic(reader)?;
    let text = read_header_text(reader)?;
    let references = read_references(reader)?;
    Ok(Header::new(text, references))
}

/// Write a complete BAM header.
pub fn write_header<W: Write>(writer: &mut W, header: &Header) -> Result<()> {
    writer.write_all(BAM_MAGIC)?;
    writer.write_all(&(header.text.len() as i32).to_le_bytes())?;
    writer.write_all(header.text.as_bytes())?;
    writer.write_all(&(header.references.len() as i32).to_le_bytes())?;

    for reference in &header.references {
        writer.write_all(&(reference.name.len() as i32 + 1).to_le_bytes())?;
        writer.write_all(reference.name.as_bytes())?;
        writer.write_all(&[0])?;
        writer.write_all(&(reference.length as i32).to_le_bytes())?;
    }

    Ok(())
}
