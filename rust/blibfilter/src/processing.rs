use std::cmp::Ordering;

use crate::config::PeakProcessingConfig;
use crate::models::{
    Peak,
    RefSpectrum,
};

/// m/z below the precursor that gets cleared.
pub const PRECURSOR_WINDOW_BELOW: f64 = 20.0;
/// m/z above the precursor that gets cleared.
pub const PRECURSOR_WINDOW_ABOVE: f64 = 5.0;

/// Turns raw peaks into the binned, filtered and normalized peaks
/// that the dot product compares.
///
/// The raw peaks of a spectrum are left untouched.
#[derive(Debug, Clone)]
pub struct PeakProcessor {
    config: PeakProcessingConfig,
}

impl Default for PeakProcessor {
    fn default() -> Self {
        Self::new(PeakProcessingConfig::default())
    }
}

impl PeakProcessor {
    pub fn new(config: PeakProcessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PeakProcessingConfig {
        &self.config
    }

    /// Index of the bin an m/z falls into, or the m/z itself when binning
    /// is disabled.
    ///
    /// ```
    /// use blibfilter::processing::PeakProcessor;
    ///
    /// let processor = PeakProcessor::default();
    /// assert_eq!(processor.bin_index(4.999), 4.0);
    /// assert_eq!(processor.bin_index(5.0), 5.0);
    /// ```
    pub fn bin_index(&self, mz: f64) -> f64 {
        if self.config.bin_size == 0.0 {
            mz
        } else {
            ((mz - self.config.bin_offset) / self.config.bin_size).floor()
        }
    }

    /// The m/z a binned peak is reported at, the lower edge of its bin.
    fn binned_mz(&self, mz: f64) -> f64 {
        if self.config.bin_size == 0.0 {
            mz
        } else {
            self.bin_index(mz) * self.config.bin_size + self.config.bin_offset
        }
    }

    /// Sum intensities that fall in the same bin.
    ///
    /// Returns the binned peaks in ascending m/z plus the summed raw intensity.
    pub fn bin_peaks(&self, peaks: &[Peak]) -> (Vec<Peak>, f64) {
        let mut order: Vec<&Peak> = peaks.iter().collect();
        if !peaks.windows(2).all(|w| w[0].mz <= w[1].mz) {
            order.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        }

        let mut total_intensity = 0.0f64;
        let mut binned: Vec<(f64, f64)> = Vec::with_capacity(peaks.len());
        for peak in order {
            total_intensity += peak.intensity as f64;
            let bin = self.binned_mz(peak.mz);
            match binned.last_mut() {
                Some((last_bin, intensity)) if *last_bin == bin => {
                    *intensity += peak.intensity as f64;
                }
                _ => binned.push((bin, peak.intensity as f64)),
            }
        }

        let binned = binned
            .into_iter()
            .map(|(mz, intensity)| Peak::new(mz, intensity as f32))
            .collect();
        (binned, total_intensity)
    }

    /// Drop peaks in `[precursor - 20, precursor + 5]`, plus the first peak
    /// on either side of that window.
    ///
    /// Expects peaks sorted by m/z.
    pub fn remove_precursor(peaks: &mut Vec<Peak>, precursor_mz: f64) {
        if peaks.is_empty() {
            return;
        }
        let low = precursor_mz - PRECURSOR_WINDOW_BELOW;
        let high = precursor_mz + PRECURSOR_WINDOW_ABOVE;
        let start = peaks.partition_point(|p| p.mz < low).saturating_sub(1);
        let end = (peaks.partition_point(|p| p.mz <= high) + 1).min(peaks.len());
        if start < end {
            peaks.drain(start..end);
        }
    }

    /// Keep the `n` most intense peaks, equal intensities prefer lower m/z.
    ///
    /// The result is ordered by decreasing intensity.
    pub fn keep_top_n(peaks: &mut Vec<Peak>, n: usize) {
        peaks.sort_by(compare_by_intensity);
        peaks.truncate(n);
    }

    /// `sqrt(intensity) * mz^2` for every peak.
    pub fn normalize(peaks: &mut [Peak]) {
        for peak in peaks.iter_mut() {
            peak.intensity = ((peak.intensity as f64).sqrt() * peak.mz * peak.mz) as f32;
        }
    }

    /// Run the whole pipeline on a list of raw peaks.
    ///
    /// Returns the processed peaks, sorted by m/z, and the total ion current
    /// of the raw peaks.
    pub fn process_peaks(&self, raw_peaks: &[Peak], precursor_mz: f64) -> (Vec<Peak>, f64) {
        let (mut peaks, total_intensity) = self.bin_peaks(raw_peaks);
        if self.config.clear_precursor {
            Self::remove_precursor(&mut peaks, precursor_mz);
        }

        if self.config.noise_first {
            Self::keep_top_n(&mut peaks, self.config.num_top_peaks);
            Self::normalize(&mut peaks);
        } else {
            Self::normalize(&mut peaks);
            Self::keep_top_n(&mut peaks, self.config.num_top_peaks);
        }

        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        (peaks, total_intensity)
    }

    /// Fill `processed_peaks` of a spectrum from its raw peaks.
    pub fn process(&self, spectrum: &mut RefSpectrum) -> f64 {
        let (processed, total_intensity) =
            self.process_peaks(&spectrum.raw_peaks, spectrum.precursor_mz);
        spectrum.processed_peaks = processed;
        total_intensity
    }
}

fn compare_by_intensity(a: &Peak, b: &Peak) -> Ordering {
    b.intensity
        .total_cmp(&a.intensity)
        .then_with(|| a.mz.total_cmp(&b.mz))
}
