//! Building a non-redundant library out of a redundant one.
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use indicatif::ProgressBar;
use tracing::{
    debug,
    error,
    info,
    instrument,
    warn,
};

use crate::codec::decode_peaks;
use crate::config::FilterConfig;
use crate::errors::{
    FilterError,
    LibraryError,
    Result,
};
use crate::grouping::{
    IonGroup,
    IonGroups,
};
use crate::library::{
    LibraryStore,
    SourceLibrary,
    read_ref_spectrum,
};
use crate::models::{
    RefSpectrum,
    RetentionTimeRow,
};
use crate::processing::PeakProcessor;
use crate::scoring::{
    Consensus,
    ScoreDirection,
    UnclassifiedScoreType,
    classify_score_types,
    select_by_best_score,
    select_by_dot_product,
};

/// Name the redundant library is attached under.
pub const REDUNDANT_SCHEMA: &str = "redundant";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub spectra_read: usize,
    pub skipped_min_peaks: usize,
    pub unreadable_peaks: usize,
    pub groups_written: usize,
    pub groups_rejected: usize,
    /// One per member of every written group.
    pub retention_times_written: usize,
}

impl std::fmt::Display for FilterStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "read {} spectra, wrote {} groups ({} retention times), rejected {} groups, skipped {} spectra with too few peaks, {} spectra had unreadable peaks",
            self.spectra_read,
            self.groups_written,
            self.retention_times_written,
            self.groups_rejected,
            self.skipped_min_peaks,
            self.unreadable_peaks
        )
    }
}

/// A best-scoring selection waiting for the bulk transfer. Only the row id
/// of the representative and the retention times of the group are kept.
struct PendingSelection {
    representative_id: i64,
    retention_times: Vec<RetentionTimeRow>,
}

/// Walks the redundant library one ion at a time and writes one
/// representative spectrum per ion to the store.
pub struct BlibFilter<'a> {
    config: &'a FilterConfig,
    processor: PeakProcessor,
    store: &'a LibraryStore,
    source: &'a SourceLibrary,
    /// Set only while selecting by search score.
    score_directions: Option<HashMap<i64, ScoreDirection>>,
    pending: Vec<PendingSelection>,
    stats: FilterStats,
    progress: ProgressBar,
}

impl<'a> BlibFilter<'a> {
    pub fn new(
        config: &'a FilterConfig,
        store: &'a LibraryStore,
        source: &'a SourceLibrary,
        progress: ProgressBar,
    ) -> Result<Self> {
        let score_directions = if config.best_scoring {
            resolve_score_directions(store, source)?
        } else {
            None
        };
        Ok(Self {
            config,
            processor: PeakProcessor::new(config.peak_processing.clone()),
            store,
            source,
            score_directions,
            pending: Vec::new(),
            stats: FilterStats::default(),
            progress,
        })
    }

    pub fn is_best_scoring(&self) -> bool {
        self.score_directions.is_some()
    }

    /// Scan every spectrum of the redundant library and write the
    /// representative of each ion.
    pub fn build_non_redundant_lib(mut self) -> Result<FilterStats> {
        let store = self.store;
        let total = store.get_spectrum_count(&self.source.schema)?;
        info!("{} spectra in the redundant library", total);
        self.progress.set_length(total as u64);

        let min_peaks = self.config.min_peaks;
        let progress = self.progress.clone();
        let mut spectra_read = 0;
        let mut skipped = 0;

        let mut stmt = store.connection().prepare(&self.source.scan_sql())?;
        let rows = stmt
            .query_map([], read_ref_spectrum)?
            .inspect(|_| {
                progress.inc(1);
                spectra_read += 1;
            })
            .filter(|row| match row {
                Ok(spectrum) if spectrum.num_peaks < min_peaks => {
                    debug!(
                        "Skipping spectrum {} with {} peaks",
                        spectrum.id, spectrum.num_peaks
                    );
                    skipped += 1;
                    false
                }
                _ => true,
            });

        for group in IonGroups::new(rows) {
            self.comp_and_insert(group?)?;
        }
        drop(stmt);

        self.stats.spectra_read = spectra_read;
        self.stats.skipped_min_peaks = skipped;
        self.transfer_best_spectra()?;
        self.progress.finish();
        Ok(self.stats)
    }

    /// Pick the representative of one ion and write it, or queue it when
    /// selecting by search score.
    fn comp_and_insert(&mut self, mut group: IonGroup) -> Result<()> {
        if let Some(directions) = &self.score_directions {
            if let Some(best) = select_by_best_score(&group.members, directions) {
                let selection = PendingSelection {
                    representative_id: group.members[best].id,
                    retention_times: self.retention_times(best, &group.members),
                };
                self.pending.push(selection);
            }
            return Ok(());
        }

        // Every member is decoded so unreadable peaks are reported for any
        // group size. Pairs are decided on the decoded peak counts.
        let score_members = group.len() >= 3;
        for spectrum in group.members.iter_mut() {
            self.load_peaks(spectrum)?;
            if score_members {
                self.processor.process(spectrum);
                spectrum.raw_peaks = Vec::new();
            }
        }

        match select_by_dot_product(&group.members, self.config.min_score) {
            Some(Consensus::Selected {
                index,
                average_score,
            }) => {
                if let Some(average_score) = average_score {
                    debug!(
                        "Selected spectrum {} for {} with average score {:.4}",
                        group.members[index].id, group.key, average_score
                    );
                }
                let retention_times = self.retention_times(index, &group.members);
                self.insert_group(group.members[index].id, retention_times)
            }
            Some(Consensus::Rejected {
                best_index,
                average_score,
            }) => {
                warn!(
                    "Rejecting {} ({} spectra): best average score {:.4} of spectrum {} is below {}",
                    group.key,
                    group.len(),
                    average_score,
                    group.members[best_index].id,
                    self.config.min_score
                );
                self.stats.groups_rejected += 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Read and decode the raw peaks of a spectrum. Unreadable peaks are
    /// logged and leave the spectrum empty.
    fn load_peaks(&mut self, spectrum: &mut RefSpectrum) -> Result<()> {
        let Some((mz_blob, intensity_blob)) = self.store.get_peak_blobs(self.source, spectrum.id)?
        else {
            error!(
                "No peaks stored for spectrum {} ({}, charge {})",
                spectrum.id, spectrum.peptide_mod_seq, spectrum.precursor_charge
            );
            self.stats.unreadable_peaks += 1;
            spectrum.raw_peaks = Vec::new();
            return Ok(());
        };

        match decode_peaks(spectrum.num_peaks as usize, &mz_blob, &intensity_blob) {
            Ok(peaks) => spectrum.raw_peaks = peaks,
            Err(e) => {
                error!(
                    "Unable to read peaks of spectrum {} ({}, charge {}): {}",
                    spectrum.id, spectrum.peptide_mod_seq, spectrum.precursor_charge, e
                );
                self.stats.unreadable_peaks += 1;
                spectrum.raw_peaks = Vec::new();
            }
        }
        Ok(())
    }

    /// Retention time rows of a group, not yet tied to a new spectrum id.
    fn retention_times(&self, best: usize, members: &[RefSpectrum]) -> Vec<RetentionTimeRow> {
        members
            .iter()
            .enumerate()
            .map(|(i, member)| {
                let source_file = self.store.map_file_id(&self.source.schema, member.file_id);
                member.retention_time_row(0, source_file, i == best)
            })
            .collect()
    }

    /// Copy the representative and write the retention times of its group.
    fn insert_group(
        &mut self,
        representative_id: i64,
        retention_times: Vec<RetentionTimeRow>,
    ) -> Result<()> {
        let new_id = self
            .store
            .transfer_spectrum(self.source, representative_id, retention_times.len())
            .map_err(|e| {
                e.append_to_context(&format!("transferring spectrum {}", representative_id))
            })?;

        for mut row in retention_times {
            row.ref_spectra_id = new_id;
            self.store.insert_retention_time(&row)?;
            self.stats.retention_times_written += 1;
        }
        self.stats.groups_written += 1;
        Ok(())
    }

    fn transfer_best_spectra(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        info!("Transferring {} best scoring spectra", self.pending.len());
        let pending = std::mem::take(&mut self.pending);
        for selection in pending {
            self.insert_group(selection.representative_id, selection.retention_times)?;
        }
        Ok(())
    }
}

/// Score directions for best-scoring mode, or `None` when some score type
/// in use has no known direction.
fn resolve_score_directions(
    store: &LibraryStore,
    source: &SourceLibrary,
) -> Result<Option<HashMap<i64, ScoreDirection>>> {
    let observed = store.observed_score_types(source)?;
    match classify_score_types(&observed) {
        Ok(directions) => {
            info!("Selecting spectra by best score over {} score types", directions.len());
            Ok(Some(directions))
        }
        Err(UnclassifiedScoreType { id, name }) => {
            warn!(
                "Score type {} ({}) has no known direction, best-scoring mode is disabled and spectra are selected by dot product",
                id.map(|x| x.to_string()).unwrap_or_else(|| "NULL".to_string()),
                name.as_deref().unwrap_or("unnamed")
            );
            Ok(None)
        }
    }
}

fn check_paths(redundant: &Path, output: &Path, overwrite: bool) -> Result<()> {
    if !redundant.is_file() {
        return Err(LibraryError::MissingFile {
            path: redundant.to_path_buf(),
        }
        .into());
    }
    if let (Ok(a), Ok(b)) = (redundant.canonicalize(), output.canonicalize()) {
        if a == b {
            return Err(LibraryError::SameInputAndOutput { path: a }.into());
        }
    }
    if output.exists() && !overwrite {
        return Err(LibraryError::OutputExists {
            path: output.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

/// Filter the library at `redundant` into a new library at `output`.
///
/// Nothing is left at `output` when this fails.
#[instrument(skip(config, progress))]
pub fn run(
    redundant: &Path,
    output: &Path,
    config: &FilterConfig,
    progress: ProgressBar,
) -> Result<FilterStats> {
    let start = Instant::now();
    check_paths(redundant, output, config.overwrite)?;
    if output.exists() {
        info!("Overwriting {}", output.display());
        std::fs::remove_file(output).map_err(|e| FilterError::Io {
            source: e,
            path: Some(output.to_path_buf()),
        })?;
    }

    let result = filter_into(redundant, output, config, progress);
    if result.is_err() && output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!("Unable to remove {}: {}", output.display(), e);
        }
    }
    let stats = result?;

    info!("Filtering finished in {:?}: {}", start.elapsed(), stats);
    Ok(stats)
}

fn filter_into(
    redundant: &Path,
    output: &Path,
    config: &FilterConfig,
    progress: ProgressBar,
) -> Result<FilterStats> {
    let mut store = LibraryStore::create(output, config.memory_cache_mb)?;
    store.attach(redundant, REDUNDANT_SCHEMA)?;
    let source = store.describe_source(REDUNDANT_SCHEMA)?;
    info!(
        "Filtering {} into {}",
        redundant.display(),
        store.path().display()
    );

    store.begin_transaction()?;
    let stats = match transfer_all(&mut store, &source, config, progress) {
        Ok(stats) => stats,
        Err(e) => {
            if let Err(rollback_err) = store.rollback() {
                warn!("Rollback failed: {}", rollback_err);
            }
            return Err(e);
        }
    };
    store.detach(REDUNDANT_SCHEMA)?;
    Ok(stats)
}

fn transfer_all(
    store: &mut LibraryStore,
    source: &SourceLibrary,
    config: &FilterConfig,
    progress: ProgressBar,
) -> Result<FilterStats> {
    store.transfer_lookup_tables(source)?;
    store.transfer_spectrum_files(source)?;
    let stats = BlibFilter::new(config, store, source, progress)?.build_non_redundant_lib()?;
    store.commit()?;
    Ok(stats)
}
