mod cli;
mod config;
mod errors;

use clap::Parser;
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use blibfilter::FilterConfig;

#[cfg(target_os = "windows")]
use mimalloc::MiMalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> std::result::Result<(), errors::CliError> {
    // Parse command line arguments
    let args = Cli::parse();

    let default_level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level.into())
                .from_env_lossy(),
        ) // This uses RUST_LOG environment variable
        .init();

    let config = match &args.config {
        Some(path) => config::load_config(path)?,
        None => FilterConfig::default(),
    };
    let config = config::apply_overrides(config, &args)?;
    info!("Parsed configuration: {:#?}", config);

    let progress = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
    )
    .map_err(|e| errors::CliError::Config {
        source: e.to_string(),
    })?;
    progress.set_style(style);

    let stats = blibfilter::run(&args.redundant, &args.filtered, &config, progress)?;
    info!(
        "Wrote {} spectra to {}",
        stats.groups_written,
        args.filtered.display()
    );
    Ok(())
}
