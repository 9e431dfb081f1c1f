use serde::{
    Deserialize,
    Serialize,
};

/// Resolved settings for a single filtering run.
///
/// Deserializes from the JSON config file, any missing field takes its
/// default.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct FilterConfig {
    /// Spectra with fewer peaks than this are skipped before grouping.
    pub min_peaks: u32,
    /// Groups whose best average dot product falls below this are dropped.
    pub min_score: f64,
    /// Pick representatives by search score instead of spectral similarity.
    pub best_scoring: bool,
    /// Page cache size of the output connection, in megabytes.
    pub memory_cache_mb: Option<u32>,
    /// Replace the output library if it already exists.
    pub overwrite: bool,
    pub peak_processing: PeakProcessingConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_peaks: 1,
            min_score: 0.0,
            best_scoring: false,
            memory_cache_mb: None,
            overwrite: false,
            peak_processing: PeakProcessingConfig::default(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PeakProcessingConfig {
    pub clear_precursor: bool,
    pub num_top_peaks: usize,
    /// Zero disables binning.
    pub bin_size: f64,
    pub bin_offset: f64,
    /// Run the top-N reduction before normalizing intensities.
    pub noise_first: bool,
}

impl Default for PeakProcessingConfig {
    fn default() -> Self {
        Self {
            clear_precursor: true,
            num_top_peaks: 100,
            bin_size: 1.0,
            bin_offset: 0.0,
            noise_first: true,
        }
    }
}
