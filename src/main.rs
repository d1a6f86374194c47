mod cli;

use anyhow::{Context, Result};
use bamtally::scan::{load_index, scan_file, scan_region};
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if args.quiet {
            EnvFilter::new("warn")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = args.filter_config()?;

    let counts = match &args.region {
        Some(region) => {
            let index = load_index(&args.bam, args.index.as_deref(), args.build_index)
                .with_context(|| format!("loading index for {}", args.bam.display()))?;
            scan_region(&args.bam, &index, region, &config)
                .with_context(|| format!("scanning {} in {}", region, args.bam.display()))?
        }
        None => scan_file(&args.bam, &config)
            .with_context(|| format!("scanning {}", args.bam.display()))?,
    };

    println!("Total on-target reads: {}", counts.on_target);
    println!(
        "Reads with mapping quality > {}: {}",
        config.quality_threshold, counts.high_quality
    );
    println!(
        "Filtered reads with mismatch rate > {}: {}",
        config.mismatch_threshold,
        counts.filtered()
    );
    if args.list_filtered {
        for name in &counts.filtered_names {
            println!("{}", name);
        }
    }
    Ok(())
}
