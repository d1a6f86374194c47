//! BAM writer.
//!
//! Writes the header into its own BGZF block, then appends encoded records.
//! Each write reports the virtual offsets around the record so callers can
//! index as they go.

use super::header::{write_header, Header};
use super::record::{encode_record, Record};
use crate::error::Result;
use crate::io::bgzf::{BgzfWriter, VirtualOffset};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// BAM file writer.
///
/// Call [`BamWriter::finish`] to write the last block and the EOF marker.
pub struct BamWriter<W: Write> {
    writer: BgzfWriter<W>,
    buffer: Vec<u8>,
}

impl<W: Write> BamWriter<W> {
    /// Create a writer and write `header`.
    pub fn new(inner: W, header: &Header) -> Result<Self> {
        let mut writer = BgzfWriter::new(inner);
        write_header(&mut writer, header)?;
        writer.flush_block()?;
        Ok(Self {
            writer,
            buffer: Vec::with_capacity(512),
        })
    }

    /// Append a record, returning the virtual offsets just before and just
    /// after it.
    pub fn write_record(&mut self, record: &Record) -> Result<(VirtualOffset, VirtualOffset)> {
        self.buffer.clear();
        encode_record(record, &mut self.buffer)?;

        let start = self.writer.virtual_offset();
        self.writer.write_all(&self.buffer)?;
        let end = self.writer.virtual_offset();
        Ok((start, end))
    }

    /// Flush everything and return the sink.
    pub fn finish(self) -> Result<W> {
        self.writer.finish()
    }
}

impl BamWriter<BufWriter<File>> {
    /// Create a BAM file.
    pub fn create<P: AsRef<Path>>(path: P, header: &Header) -> Result<Self> {
        let file = File::create(path)?;
        Self::new(BufWriter::new(file), header)
    }
}
