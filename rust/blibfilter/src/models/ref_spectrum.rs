use super::{
    Peak,
    RetentionTimeRow,
};

/// Identity fields of non-peptide entries.
///
/// All empty for peptides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SmallMoleculeInfo {
    pub molecule_name: String,
    pub chemical_formula: String,
    pub precursor_adduct: String,
    pub inchi_key: String,
    pub other_keys: String,
}

impl SmallMoleculeInfo {
    pub fn is_empty(&self) -> bool {
        self.molecule_name.is_empty()
            && self.chemical_formula.is_empty()
            && self.precursor_adduct.is_empty()
            && self.inchi_key.is_empty()
            && self.other_keys.is_empty()
    }
}

/// The peptide ion (or small molecule ion) a spectrum belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct IonKey {
    pub peptide_mod_seq: String,
    pub charge: i32,
    pub small_molecule: SmallMoleculeInfo,
}

impl std::fmt::Display for IonKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.small_molecule.is_empty() {
            write!(f, "{}/{}", self.peptide_mod_seq, self.charge)
        } else {
            write!(
                f,
                "{}{}/{}",
                self.small_molecule.molecule_name,
                self.small_molecule.precursor_adduct,
                self.charge
            )
        }
    }
}

/// A single spectrum read from the redundant library.
#[derive(Debug, Clone, Default)]
pub struct RefSpectrum {
    pub id: i64,
    pub peptide_seq: String,
    pub peptide_mod_seq: String,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
    pub prev_aa: Option<String>,
    pub next_aa: Option<String>,
    pub num_peaks: u32,
    pub score: Option<f64>,
    pub score_type: Option<i64>,
    pub ion_mobility: Option<f64>,
    pub collisional_cross_section: Option<f64>,
    pub ion_mobility_high_energy_offset: Option<f64>,
    pub ion_mobility_type: Option<i64>,
    pub small_molecule: SmallMoleculeInfo,
    pub retention_time: Option<f64>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub total_ion_current: Option<f64>,
    pub spec_id_in_file: Option<String>,
    pub file_id: Option<i64>,
    /// Decoded peaks, empty until loaded.
    pub raw_peaks: Vec<Peak>,
    /// Binned/filtered/normalized peaks used only for scoring.
    pub processed_peaks: Vec<Peak>,
}

impl RefSpectrum {
    pub fn ion_key(&self) -> IonKey {
        IonKey {
            peptide_mod_seq: self.peptide_mod_seq.clone(),
            charge: self.precursor_charge,
            small_molecule: self.small_molecule.clone(),
        }
    }

    pub fn belongs_to(&self, key: &IonKey) -> bool {
        self.precursor_charge == key.charge
            && self.peptide_mod_seq == key.peptide_mod_seq
            && self.small_molecule == key.small_molecule
    }

    /// Number of decoded peaks. Zero when the peaks were never read or
    /// could not be decoded.
    pub fn num_raw_peaks(&self) -> usize {
        self.raw_peaks.len()
    }

    /// Start and end time, only when both are present.
    pub fn time_window(&self) -> Option<(f64, f64)> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn retention_time_row(
        &self,
        ref_spectra_id: i64,
        spectrum_source_id: Option<i64>,
        best_spectrum: bool,
    ) -> RetentionTimeRow {
        let window = self.time_window();
        RetentionTimeRow {
            ref_spectra_id,
            redundant_ref_spectra_id: self.id,
            spectrum_source_id,
            ion_mobility: self.ion_mobility,
            collisional_cross_section: self.collisional_cross_section,
            ion_mobility_high_energy_offset: self.ion_mobility_high_energy_offset,
            ion_mobility_type: self.ion_mobility_type,
            retention_time: self.retention_time,
            start_time: window.map(|w| w.0),
            end_time: window.map(|w| w.1),
            score: self.score,
            best_spectrum,
        }
    }
}
