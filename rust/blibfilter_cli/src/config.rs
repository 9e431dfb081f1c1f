use std::path::Path;

use blibfilter::FilterConfig;

use crate::cli::Cli;
use crate::errors::CliError;

/// Read a JSON config, missing fields take their defaults.
pub fn load_config(path: &Path) -> Result<FilterConfig, CliError> {
    let conf = std::fs::File::open(path).map_err(|e| CliError::Io {
        source: e.to_string(),
        path: Some(path.to_string_lossy().to_string()),
    })?;
    serde_json::from_reader(std::io::BufReader::new(conf))
        .map_err(|e| CliError::ParseError { msg: e.to_string() })
}

/// Command line flags win over the config file.
pub fn apply_overrides(mut config: FilterConfig, args: &Cli) -> Result<FilterConfig, CliError> {
    if let Some(min_peaks) = args.min_peaks {
        config.min_peaks = min_peaks;
    }
    if let Some(min_score) = args.min_score {
        config.min_score = min_score;
    }
    if args.best_scoring {
        config.best_scoring = true;
    }
    if let Some(mb) = args.memory_cache_mb {
        config.memory_cache_mb = Some(mb);
    }
    if args.overwrite {
        config.overwrite = true;
    }

    if !config.min_score.is_finite() {
        return Err(CliError::Config {
            source: format!("min_score must be a finite number, got {}", config.min_score),
        });
    }
    let processing = &config.peak_processing;
    if !(processing.bin_size.is_finite() && processing.bin_size >= 0.0) {
        return Err(CliError::Config {
            source: format!("bin_size must be zero or positive, got {}", processing.bin_size),
        });
    }
    Ok(config)
}
