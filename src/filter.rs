//! Read filter pipeline.
//!
//! Each record gets a [`ReadOutcome`] from [`evaluate`], a pure function of
//! the record and a [`FilterConfig`]. [`ReadCounts::tally`] folds outcomes
//! into the three report values:
//!
//! 1. unmapped reads are skipped
//! 2. reads whose whole sequence is `N` are skipped
//! 3. every other read is on target
//! 4. on-target reads with mapping quality strictly above the threshold are
//!    high quality
//! 5. on-target reads with an `NM` tag whose NM / query length is strictly
//!    above the threshold have their name recorded; a zero query length
//!    means the rate is not evaluated

use crate::error::{Error, Result};
use crate::io::bam::Record;

/// Default mapping-quality threshold.
pub const DEFAULT_QUALITY_THRESHOLD: u8 = 20;

/// Default mismatch-rate threshold.
pub const DEFAULT_MISMATCH_THRESHOLD: f64 = 0.1;

/// Thresholds for one scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterConfig {
    /// Reads with mapping quality strictly above this are high quality
    pub quality_threshold: u8,
    /// Reads with NM / query length strictly above this are filtered
    pub mismatch_threshold: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            quality_threshold: DEFAULT_QUALITY_THRESHOLD,
            mismatch_threshold: DEFAULT_MISMATCH_THRESHOLD,
        }
    }
}

impl FilterConfig {
    pub fn new(quality_threshold: u8, mismatch_threshold: f64) -> Result<Self> {
        let config = FilterConfig {
            quality_threshold,
            mismatch_threshold,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject a mismatch threshold that is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        if !self.mismatch_threshold.is_finite() || self.mismatch_threshold < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "mismatch threshold must be a finite, non-negative fraction, got {}",
                self.mismatch_threshold
            )));
        }
        Ok(())
    }
}

/// Why a read was not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Unmapped,
    AllUnknownBases,
}

/// Verdict for a single read.
#[derive(Debug, Clone, PartialEq)]
pub enum ReadOutcome {
    Skipped(SkipReason),
    OnTarget {
        high_quality: bool,
        /// NM / query length, when the read has an NM tag and bases
        mismatch_rate: Option<f64>,
        /// Whether the mismatch rate exceeds the threshold
        filtered: bool,
    },
}

/// Classify one record.
///
/// An `NM` tag that is present but not an integer is ignored with a
/// warning rather than failing the scan.
pub fn evaluate(record: &Record, config: &FilterConfig) -> ReadOutcome {
    if record.is_unmapped() {
        return ReadOutcome::Skipped(SkipReason::Unmapped);
    }
    if record.is_all_unknown() {
        return ReadOutcome::Skipped(SkipReason::AllUnknownBases);
    }

    let high_quality = record.mapq > config.quality_threshold;

    let nm = match record.tags.integer(b"NM") {
        Ok(nm) => nm,
        Err(e) => {
            tracing::warn!(read = %record.name, error = %e, "ignoring NM tag");
            None
        }
    };

    let query_length = record.query_length();
    let mismatch_rate = match nm {
        Some(nm) if query_length > 0 => Some(nm as f64 / query_length as f64),
        _ => None,
    };
    let filtered = mismatch_rate.is_some_and(|rate| rate > config.mismatch_threshold);

    ReadOutcome::OnTarget {
        high_quality,
        mismatch_rate,
        filtered,
    }
}

/// Accumulated result of a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadCounts {
    pub on_target: u64,
    pub high_quality: u64,
    /// Names of reads over the mismatch threshold, in encounter order
    pub filtered_names: Vec<String>,
    pub skipped_unmapped: u64,
    pub skipped_all_n: u64,
}

impl ReadCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate `record` and fold the outcome in.
    pub fn tally(&mut self, record: &Record, config: &FilterConfig) {
        match evaluate(record, config) {
            ReadOutcome::Skipped(SkipReason::Unmapped) => self.skipped_unmapped += 1,
            ReadOutcome::Skipped(SkipReason::AllUnknownBases) => self.skipped_all_n += 1,
            ReadOutcome::OnTarget {
                high_quality,
                filtered,
                ..
            } => {
                self.on_target += 1;
                if high_quality {
                    self.high_quality += 1;
                }
                if filtered {
                    self.filtered_names.push(record.name.clone());
                }
            }
        }
    }

    /// Number of filtered reads.
    pub fn filtered(&self) -> usize {
        self.filtered_names.len()
    }
}

/// Run the pipeline over a stream of decoded records.
///
/// Stops at the first error; counts gathered up to that point are dropped.
pub fn count_reads<I>(records: I, config: &FilterConfig) -> Result<ReadCounts>
where
    I: IntoIterator<Item = Result<Record>>,
{
    config.validate()?;
    let mut counts = ReadCounts::new();
    for record in records {
        counts.tally(&record?, config);
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::bam::record::flags;
    use crate::io::bam::TagValue;

    fn read(name: &str, mapq: u8, seq: &[u8]) -> Record {
        let mut record = Record::new();
        record.name = name.to_string();
        record.reference_id = Some(0);
        record.position = Some(100);
        record.mapq = mapq;
        record.sequence = seq.to_vec();
        record
    }

    fn with_nm(mut record: Record, nm: TagValue) -> Record {
        record.tags.insert(*b"NM", nm);
        record
    }

    #[test]
    fn test_three_record_boundaries() {
        let mut unmapped = read("unmapped", 60, b"ACGT");
        unmapped.flags = flags::UNMAPPED;
        let at_threshold = read("q20", 20, b"ACGT");
        let boundary_rate = with_nm(read("q25", 25, &[b'A'; 50]), TagValue::UInt8(5));

        let config = FilterConfig::new(20, 0.1).unwrap();
        let counts = count_reads(
            vec![Ok(unmapped), Ok(at_threshold), Ok(boundary_rate)],
            &config,
        )
        .unwrap();

        assert_eq!(counts.on_target, 2);
        assert_eq!(counts.high_quality, 1);
        assert!(counts.filtered_names.is_empty());
        assert_eq!(counts.skipped_unmapped, 1);
    }

    #[test]
    fn test_all_n_is_skipped_even_when_mapped() {
        let config = FilterConfig::default();
        assert_eq!(
            evaluate(&read("n", 60, b"NNNNN"), &config),
            ReadOutcome::Skipped(SkipReason::AllUnknownBases)
        );
        // A single real base keeps the read
        assert!(matches!(
            evaluate(&read("n", 60, b"NNANN"), &config),
            ReadOutcome::OnTarget { .. }
        ));
    }

    #[test]
    fn test_empty_sequence_is_on_target() {
        let outcome = evaluate(&read("empty", 0, b""), &FilterConfig::default());
        assert!(matches!(outcome, ReadOutcome::OnTarget { high_quality: false, .. }));
    }

    #[test]
    fn test_nm_with_zero_query_length_is_not_evaluated() {
        let record = with_nm(read("hardclipped", 60, b""), TagValue::Int32(3));
        assert_eq!(
            evaluate(&record, &FilterConfig::default()),
            ReadOutcome::OnTarget {
                high_quality: true,
                mismatch_rate: None,
                filtered: false,
            }
        );
    }

    #[test]
    fn test_high_mismatch_rate_is_filtered_in_order() {
        let config = FilterConfig::default();
        let mut counts = ReadCounts::new();
        counts.tally(&with_nm(read("r1", 30, b"ACGTACGTAC"), TagValue::UInt8(2)), &config);
        counts.tally(&with_nm(read("r2", 30, b"ACGTACGTAC"), TagValue::UInt8(1)), &config);
        counts.tally(&with_nm(read("r3", 30, b"ACGTACGTAC"), TagValue::Int16(5)), &config);

        assert_eq!(counts.filtered_names, vec!["r1", "r3"]);
        assert_eq!(counts.filtered(), 2);
        assert_eq!(counts.on_target, 3);
    }

    #[test]
    fn test_absent_nm_versus_zero_nm() {
        let config = FilterConfig::new(20, 0.0).unwrap();
        let absent = evaluate(&read("a", 30, b"ACGT"), &config);
        let zero = evaluate(&with_nm(read("z", 30, b"ACGT"), TagValue::UInt8(0)), &config);

        assert!(matches!(absent, ReadOutcome::OnTarget { mismatch_rate: None, .. }));
        assert!(matches!(
            zero,
            ReadOutcome::OnTarget { mismatch_rate: Some(r), filtered: false, .. } if r == 0.0
        ));
    }

    #[test]
    fn test_non_integer_nm_is_ignored() {
        let record = with_nm(read("s", 30, b"ACGT"), TagValue::String(b"4".to_vec()));
        assert!(matches!(
            evaluate(&record, &FilterConfig::default()),
            ReadOutcome::OnTarget { mismatch_rate: None, filtered: false, .. }
        ));
    }

    #[test]
    fn test_mapq_255_counts_as_high_quality() {
        let outcome = evaluate(&read("m", 255, b"ACGT"), &FilterConfig::default());
        assert!(matches!(outcome, ReadOutcome::OnTarget { high_quality: true, .. }));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(FilterConfig::new(20, -0.1), Err(Error::InvalidConfig(_))));
        assert!(FilterConfig::new(20, f64::NAN).is_err());
        assert!(FilterConfig::new(20, f64::INFINITY).is_err());
        assert!(FilterConfig::new(0, 0.0).is_ok());
    }

    #[test]
    fn test_error_discards_counts() {
        let records = vec![
            Ok(read("ok", 30, b"ACGT")),
            Err(Error::TruncatedRecord {
                expected: 40,
                actual: 12,
            }),
        ];
        assert!(matches!(
            count_reads(records, &FilterConfig::default()),
            Err(Error::TruncatedRecord { .. })
        ));
    }
}
