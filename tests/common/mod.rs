//! Fixture BAMs written into a temporary directory.

#![allow(dead_code)]

use bamtally::io::bam::record::flags;
use bamtally::io::bam::{BamWriter, CigarOp, Header, IndexBuilder, Record, Reference, TagValue};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub fn header() -> Header {
    Header::new(
        "@HD\tVN:1.6\tSO:coordinate\n@SQ\tSN:chr1\tLN:100000\n@SQ\tSN:chr2\tLN:50000\n",
        vec![Reference::new("chr1", 100_000), Reference::new("chr2", 50_000)],
    )
}

/// A mapped read of `len` matching bases.
pub fn read(name: &str, reference_id: usize, pos: i32, mapq: u8, len: u32, nm: Option<u8>) -> Record {
    let mut record = Record::new();
    record.name = name.to_string();
    record.reference_id = Some(reference_id);
    record.position = Some(pos);
    record.mapq = mapq;
    record.cigar = vec![CigarOp::Match(len)];
    record.sequence = vec![b'A'; len as usize];
    record.quality = vec![30; len as usize];
    if let Some(nm) = nm {
        record.tags.insert(*b"NM", TagValue::UInt8(nm));
    }
    record
}

/// Records around `chr1:10000-20000`, coordinate sorted.
///
/// Inside the region: `edge_left`, `lowq`, `hiq_mm`, `at_end` are counted;
/// `placed_unmapped` and `all_n` are skipped.
pub fn records() -> Vec<Record> {
    let mut placed_unmapped = Record::new();
    placed_unmapped.name = "placed_unmapped".to_string();
    placed_unmapped.reference_id = Some(0);
    placed_unmapped.position = Some(12_000);
    placed_unmapped.flags = flags::UNMAPPED;
    placed_unmapped.sequence = b"ACGT".to_vec();

    let mut all_n = read("all_n", 0, 13_000, 60, 50, None);
    all_n.sequence = vec![b'N'; 50];

    let mut unplaced = Record::new();
    unplaced.name = "unplaced".to_string();
    unplaced.flags = flags::UNMAPPED;
    unplaced.sequence = b"ACGTACGT".to_vec();

    vec![
        read("before", 0, 5_000, 30, 100, Some(0)),
        read("edge_left", 0, 9_950, 30, 100, Some(2)),
        placed_unmapped,
        all_n,
        read("lowq", 0, 14_000, 10, 50, Some(10)),
        read("hiq_mm", 0, 15_000, 60, 100, Some(15)),
        read("at_end", 0, 19_999, 20, 50, None),
        read("after", 0, 20_000, 30, 50, None),
        read("far", 0, 80_000, 30, 50, Some(40)),
        read("other", 1, 15_000, 30, 50, None),
        unplaced,
    ]
}

pub struct Fixture {
    pub dir: TempDir,
    pub bam: PathBuf,
}

impl Fixture {
    /// `sample.bam` plus `sample.bam.bai`.
    pub fn new() -> Self {
        Self::with_records(&records())
    }

    pub fn with_records(records: &[Record]) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let bam = dir.path().join("sample.bam");
        write_indexed(&bam, records);
        Fixture { dir, bam }
    }

    pub fn default_index(&self) -> PathBuf {
        index_path(&self.bam)
    }
}

pub fn index_path(bam: &Path) -> PathBuf {
    let mut path = bam.as_os_str().to_owned();
    path.push(".bai");
    PathBuf::from(path)
}

/// Write `records` to `bam` and index them as they are written.
pub fn write_indexed(bam: &Path, records: &[Record]) {
    let header = header();
    let mut writer = BamWriter::create(bam, &header).expect("create BAM");
    let mut builder = IndexBuilder::new(header.reference_count());
    for record in records {
        let (start, end) = writer.write_record(record).expect("write record");
        builder.add_record(record, start, end).expect("index record");
    }
    writer.finish().expect("finish BAM");
    builder
        .build()
        .to_path(index_path(bam))
        .expect("write index");
}
