/// One `RetentionTimes` row, written for every member of a kept group.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionTimeRow {
    pub ref_spectra_id: i64,
    pub redundant_ref_spectra_id: i64,
    pub spectrum_source_id: Option<i64>,
    pub ion_mobility: Option<f64>,
    pub collisional_cross_section: Option<f64>,
    pub ion_mobility_high_energy_offset: Option<f64>,
    pub ion_mobility_type: Option<i64>,
    pub retention_time: Option<f64>,
    pub start_time: Option<f64>,
    pub end_time: Option<f64>,
    pub score: Option<f64>,
    pub best_spectrum: bool,
}
