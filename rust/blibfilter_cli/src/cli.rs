use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the redundant library
    pub redundant: PathBuf,

    /// Path of the non-redundant library to write
    pub filtered: PathBuf,

    /// Path to the JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Minimum number of peaks a spectrum needs to be considered (will over-write the config file)
    #[arg(short = 'n', long)]
    pub min_peaks: Option<u32>,

    /// Minimum average dot product for a group of three or more spectra (will over-write the config file)
    #[arg(short = 's', long)]
    pub min_score: Option<f64>,

    /// Pick the spectrum with the best search score instead of the consensus
    #[arg(short, long)]
    pub best_scoring: bool,

    /// SQLite page cache for the output library, in megabytes
    #[arg(short, long)]
    pub memory_cache_mb: Option<u32>,

    /// Replace the filtered library if it already exists
    #[arg(long)]
    pub overwrite: bool,

    /// Log debug messages
    #[arg(short, long)]
    pub verbose: bool,
}
