//! Error types for bamtally

use std::io;
use thiserror::Error;

/// Result type alias for bamtally operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while decoding, indexing or scanning BAM data.
///
/// Every variant is fatal to the scan that produced it. Counts accumulated
/// before the failure are dropped together with the scan.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (missing file, permission, unexpected end of file)
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),

    /// BGZF block with a bad header, bad checksum or undecodable payload
    #[error("Corrupt BGZF block at offset {offset}: {msg}")]
    CorruptBlock {
        /// Compressed file offset of the block
        offset: u64,
        /// What was wrong with it
        msg: String,
    },

    /// Fewer bytes remain than the record declares
    #[error("Truncated BAM record: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        /// Bytes the record declared
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Record fields disagree with each other or with the declared length
    #[error("Invalid BAM record: {0}")]
    InvalidRecord(String),

    /// Region names a reference that is not in the BAM header
    #[error("Unknown reference: {0}")]
    UnknownReference(String),

    /// Region string that cannot be parsed into reference/start/end
    #[error("Malformed region '{region}': {msg}")]
    MalformedRegion {
        /// The region string as given
        region: String,
        /// Why it was rejected
        msg: String,
    },

    /// BAM header that cannot be decoded
    #[error("Invalid BAM header: {0}")]
    InvalidHeader(String),

    /// BAI index that cannot be decoded or built
    #[error("Invalid BAI index: {0}")]
    InvalidIndex(String),

    /// Seek target outside the block it points into
    #[error("Invalid virtual offset {offset:#x}: {msg}")]
    InvalidVirtualOffset {
        /// Raw 64-bit virtual offset
        offset: u64,
        /// Why the seek failed
        msg: String,
    },

    /// Rejected filter or scan configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn corrupt_block(offset: u64, msg: impl Into<String>) -> Self {
        Error::CorruptBlock {
            offset,
            msg: msg.into(),
        }
    }

    pub(crate) fn malformed_region(region: &str, msg: impl Into<String>) -> Self {
        Error::MalformedRegion {
            region: region.to_string(),
            msg: msg.into(),
        }
    }
}

// The BGZF reader implements `std::io::Read`, which tunnels typed errors
// through `io::Error`. Unwrap them again on the way back so callers still
// see `CorruptBlock` rather than a generic I/O error.
impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        if !e.get_ref().map_or(false, |inner| inner.is::<Error>()) {
            return Error::Io(e);
        }
        let kind = e.kind();
        match e.into_inner().map(|inner| inner.downcast::<Error>()) {
            Some(Ok(typed)) => *typed,
            Some(Err(inner)) => Error::Io(io::Error::new(kind, inner)),
            None => Error::Io(io::Error::from(kind)),
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(io_err) => io_err,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
