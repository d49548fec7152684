//! tnp-hists: tag-and-probe histogram and datacard builder

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};

use tnp_cards::{AnalysisConfig, RunOptions, run_build};
use tnp_ntuple::ParquetSource;

#[derive(Parser)]
#[command(name = "tnp-hists")]
#[command(about = "Build tag-and-probe histogram containers and datacards from event trees")]
#[command(version)]
struct Cli {
    /// Analysis configuration (YAML)
    config: PathBuf,

    /// Also write every leaf histogram to diagnosis_<bin>.parquet
    #[arg(long)]
    diagnosis: bool,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: tracing::Level,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt().with_max_level(cli.log_level).with_target(false).init();

    cmd_build(&cli.config, cli.diagnosis)
}

fn cmd_build(config_path: &Path, diagnosis: bool) -> Result<()> {
    tracing::info!(path = %config_path.display(), version = tnp_core::VERSION, "loading configuration");
    let config = AnalysisConfig::from_path(config_path)?;

    let options = RunOptions { out_dir: std::env::current_dir()?, diagnosis };
    let summary = run_build(&config, &options, &ParquetSource::new())?;

    for bin in &summary.bins {
        println!("{}\t{}\tnorm={:.6}", bin.bin, bin.datacard.display(), bin.norm);
    }
    println!("{}", summary.script.display());
    Ok(())
}
