//! Scan driver: open a BAM, find its index, stream records through the
//! filter pipeline.
//!
//! File handles live inside the readers created here and are closed when
//! the scan returns, whether it succeeded or not.

use crate::error::{Error, Result};
use crate::filter::{count_reads, FilterConfig, ReadCounts};
use crate::io::bam::{build_index, BaiIndex, BamReader};
use std::io;
use std::path::{Path, PathBuf};

/// Index file names tried for `bam_path`, in order: `<bam>.bai`, then the
/// BAM name with its extension replaced by `.bai`.
pub fn index_candidates(bam_path: &Path) -> Vec<PathBuf> {
    let mut appended = bam_path.as_os_str().to_owned();
    appended.push(".bai");

    let mut candidates = vec![PathBuf::from(appended)];
    let replaced = bam_path.with_extension("bai");
    if !candidates.contains(&replaced) {
        candidates.push(replaced);
    }
    candidates
}

/// First existing index file for `bam_path`.
pub fn locate_index(bam_path: &Path) -> Option<PathBuf> {
    index_candidates(bam_path).into_iter().find(|p| p.is_file())
}

/// Build an index for `bam_path` and write it to `<bam>.bai`.
///
/// Returns the index and where it was written.
pub fn build_index_file(bam_path: &Path) -> Result<(BaiIndex, PathBuf)> {
    let mut reader = BamReader::from_path(bam_path)?;
    let index = build_index(&mut reader)?;

    let mut index_path = bam_path.as_os_str().to_owned();
    index_path.push(".bai");
    let index_path = PathBuf::from(index_path);
    index.to_path(&index_path)?;

    tracing::info!(bam = %bam_path.display(), index = %index_path.display(), "wrote index");
    Ok((index, index_path))
}

/// Load the index for `bam_path`.
///
/// An explicit path is used as is. Otherwise the usual companion names are
/// tried; if none exists the index is built when `build_if_missing` is set
/// and reported as a not-found I/O error when it is not.
pub fn load_index(
    bam_path: &Path,
    explicit: Option<&Path>,
    build_if_missing: bool,
) -> Result<BaiIndex> {
    if let Some(path) = explicit {
        tracing::debug!(index = %path.display(), "loading index");
        return BaiIndex::from_path(path);
    }

    if let Some(path) = locate_index(bam_path) {
        tracing::debug!(index = %path.display(), "loading index");
        return BaiIndex::from_path(path);
    }

    if build_if_missing {
        tracing::info!(bam = %bam_path.display(), "no index found, building one");
        return build_index_file(bam_path).map(|(index, _)| index);
    }

    let tried: Vec<String> = index_candidates(bam_path)
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    Err(Error::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no BAI index for {} (tried {})", bam_path.display(), tried.join(", ")),
    )))
}

/// Count reads overlapping `region` in `bam_path`.
///
/// # Example
///
/// ```no_run
/// use bamtally::filter::FilterConfig;
/// use bamtally::scan::{load_index, scan_region};
/// use std::path::Path;
///
/// # fn main() -> bamtally::Result<()> {
/// let bam = Path::new("input.bam");
/// let index = load_index(bam, None, false)?;
/// let counts = scan_region(bam, &index, "chr1:10000-20000", &FilterConfig::default())?;
/// println!("Total on-target reads: {}", counts.on_target);
/// # Ok(())
/// # }
/// ```
pub fn scan_region(
    bam_path: &Path,
    index: &BaiIndex,
    region: &str,
    config: &FilterConfig,
) -> Result<ReadCounts> {
    let mut reader = BamReader::from_path(bam_path)?;
    let query = reader.query(index, region)?;
    tracing::debug!(region, chunks = query.chunks().len(), "scanning region");

    let counts = count_reads(query, config)?;
    log_summary(bam_path, Some(region), &counts);
    Ok(counts)
}

/// Count every record in `bam_path`, without an index.
pub fn scan_file(bam_path: &Path, config: &FilterConfig) -> Result<ReadCounts> {
    let mut reader = BamReader::from_path(bam_path)?;
    let counts = count_reads(reader.records(), config)?;
    log_summary(bam_path, None, &counts);
    Ok(counts)
}

fn log_summary(bam_path: &Path, region: Option<&str>, counts: &ReadCounts) {
    tracing::info!(
        bam = %bam_path.display(),
        region = region.unwrap_or("*"),
        on_target = counts.on_target,
        high_quality = counts.high_quality,
        filtered = counts.filtered(),
        skipped_unmapped = counts.skipped_unmapped,
        skipped_all_n = counts.skipped_all_n,
        "scan complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_index_candidates() {
        let candidates = index_candidates(Path::new("/data/sample.bam"));
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/data/sample.bam.bai"),
                PathBuf::from("/data/sample.bai")
            ]
        );
    }

    #[test]
    fn test_locate_index_prefers_appended_name() {
        let dir = tempdir().unwrap();
        let bam = dir.path().join("x.bam");
        assert_eq!(locate_index(&bam), None);

        fs::write(dir.path().join("x.bai"), b"").unwrap();
        assert_eq!(locate_index(&bam), Some(dir.path().join("x.bai")));

        fs::write(dir.path().join("x.bam.bai"), b"").unwrap();
        assert_eq!(locate_index(&bam), Some(dir.path().join("x.bam.bai")));
    }

    #[test]
    fn test_missing_index_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_index(&dir.path().join("x.bam"), None, false).unwrap_err();
        match err {
            Error::Io(e) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("expected Io, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_bam_is_io_error() {
        let dir = tempdir().unwrap();
        let err = scan_file(&dir.path().join("missing.bam"), &FilterConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
