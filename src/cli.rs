use bamtally::filter::{FilterConfig, DEFAULT_MISMATCH_THRESHOLD, DEFAULT_QUALITY_THRESHOLD};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "bamtally",
    about = "Count on-target, high-quality and high-mismatch reads in a BAM region",
    version
)]
pub struct Args {
    /// Input BAM (coordinate sorted when a region is given)
    pub bam: PathBuf,

    /// Region to scan, e.g. chr1:10000-20000; the whole file when omitted
    pub region: Option<String>,

    /// BAI index (default: <BAM>.bai, then <BAM stem>.bai)
    #[arg(short = 'i', long = "index", value_name = "BAI")]
    pub index: Option<PathBuf>,

    /// Reads with mapping quality strictly above this are high quality
    #[arg(
        short = 'q',
        long = "min-mapq",
        alias = "quality-threshold",
        default_value_t = DEFAULT_QUALITY_THRESHOLD
    )]
    pub quality_threshold: u8,

    /// Reads with NM / query length strictly above this are reported as filtered
    #[arg(
        short = 'm',
        long = "max-mismatch-rate",
        alias = "mismatch-threshold",
        default_value_t = DEFAULT_MISMATCH_THRESHOLD
    )]
    pub mismatch_threshold: f64,

    /// Build <BAM>.bai when no index is found
    #[arg(long)]
    pub build_index: bool,

    /// Print the names of filtered reads after the summary
    #[arg(long)]
    pub list_filtered: bool,

    /// Set logging level to WARN
    #[arg(long)]
    pub quiet: bool,
}

impl Args {
    pub fn filter_config(&self) -> bamtally::Result<FilterConfig> {
        FilterConfig::new(self.quality_threshold, self.mismatch_threshold)
    }
}
