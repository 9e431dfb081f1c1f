//! The redundant library being read, and the differences between its
//! versions that matter for reading and copying spectra.
use rusqlite::Row;
use rusqlite::types::ValueRef;

use super::schema::quote_identifier;
use crate::models::{
    RefSpectrum,
    SmallMoleculeInfo,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: i32,
    pub minor: i32,
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Columns every readable `RefSpectra` table has.
pub const REQUIRED_SPECTRA_COLUMNS: &[&str] = &[
    "id",
    "peptideSeq",
    "precursorMZ",
    "precursorCharge",
    "peptideModSeq",
    "numPeaks",
];

/// Columns read by the scan, in the order [`read_ref_spectrum`] expects them.
const SCAN_COLUMNS: &[&str] = &[
    "id",
    "peptideSeq",
    "precursorMZ",
    "precursorCharge",
    "peptideModSeq",
    "prevAA",
    "nextAA",
    "numPeaks",
    "score",
    "scoreType",
    "ionMobility",
    "collisionalCrossSectionSqA",
    "ionMobilityHighEnergyOffset",
    "ionMobilityType",
    "moleculeName",
    "chemicalFormula",
    "precursorAdduct",
    "inchiKey",
    "otherKeys",
    "startTime",
    "endTime",
    "totalIonCurrent",
    "retentionTime",
    "SpecIDinFile",
    "fileID",
];

const SMALL_MOLECULE_COLUMNS: &[&str] = &[
    "moleculeName",
    "chemicalFormula",
    "precursorAdduct",
    "inchiKey",
    "otherKeys",
];

/// Columns never copied as-is when a spectrum moves to the output library.
const NOT_TRANSFERRED: &[&str] = &["id", "copies", "fileID"];

/// Description of an attached library.
#[derive(Debug, Clone)]
pub struct SourceLibrary {
    pub schema: String,
    pub version: SchemaVersion,
    pub spectra_columns: Vec<String>,
    /// Empty when the table does not exist.
    pub annotation_columns: Vec<String>,
    pub has_modifications: bool,
    pub has_source_files: bool,
    pub source_file_columns: Vec<String>,
    pub has_score_types: bool,
    pub has_ion_mobility_types: bool,
    /// `INSERT ... SELECT` copying one spectrum into the output library,
    /// bound to `(copies, fileID, source id)`. Empty until described by a
    /// [`LibraryStore`](super::LibraryStore).
    pub spectrum_transfer_sql: String,
}

impl SourceLibrary {
    pub fn has_column(&self, column: &str) -> bool {
        self.spectra_columns.iter().any(|c| c.eq_ignore_ascii_case(column))
    }

    /// Expression reading `column` from this library's `RefSpectra`,
    /// looking through the names older versions used.
    pub fn column_expr(&self, column: &str) -> Option<String> {
        if self.has_column(column) {
            return Some(quote_identifier(column));
        }
        let aliases: &[&str] = match column {
            "ionMobility" => &["ionMobilityValue", "driftTimeMsec"],
            "collisionalCrossSectionSqA" => &["collisionalCrossSection"],
            "ionMobilityHighEnergyOffset" => &["ionMobilityHighEnergyDriftTimeOffsetMsec"],
            _ => &[],
        };
        if let Some(alias) = aliases.iter().find(|a| self.has_column(a)) {
            return Some(quote_identifier(alias));
        }
        if column == "ionMobilityType" && self.has_column("driftTimeMsec") {
            return Some(
                "CASE WHEN \"driftTimeMsec\" IS NULL OR \"driftTimeMsec\" = 0 THEN 0 ELSE 1 END"
                    .to_string(),
            );
        }
        None
    }

    pub fn is_small_molecule_aware(&self) -> bool {
        self.has_column("moleculeName")
    }

    /// All spectra sorted so that spectra of one ion are adjacent.
    pub fn scan_sql(&self) -> String {
        let select: Vec<String> = SCAN_COLUMNS
            .iter()
            .map(|c| self.column_expr(c).unwrap_or_else(|| "NULL".to_string()))
            .collect();
        // NULL and empty keys read back the same, so they must sort together.
        let mut order = vec![
            "COALESCE(\"peptideModSeq\", '')".to_string(),
            "COALESCE(\"precursorCharge\", 0)".to_string(),
        ];
        order.extend(
            SMALL_MOLECULE_COLUMNS
                .iter()
                .filter_map(|c| self.column_expr(c))
                .map(|expr| format!("COALESCE({}, '')", expr)),
        );
        order.push("\"id\"".to_string());
        format!(
            "SELECT {} FROM {}.RefSpectra ORDER BY {}",
            select.join(", "),
            self.schema,
            order.join(", ")
        )
    }

    /// The statement copying one spectrum into `main.RefSpectra` with
    /// `output_columns`.
    pub fn spectrum_transfer_sql(&self, output_columns: &[String]) -> String {
        let (dest, exprs): (Vec<String>, Vec<String>) =
            self.transfer_columns(output_columns).into_iter().unzip();
        format!(
            "INSERT INTO main.RefSpectra (copies, fileID, {}) SELECT ?1, ?2, {} FROM {}.RefSpectra WHERE id = ?3",
            dest.join(", "),
            exprs.join(", "),
            self.schema
        )
    }

    /// Pairs of `(output column, source expression)` for copying spectra
    /// into a table with `output_columns`.
    pub fn transfer_columns(&self, output_columns: &[String]) -> Vec<(String, String)> {
        output_columns
            .iter()
            .filter(|c| !NOT_TRANSFERRED.iter().any(|n| n.eq_ignore_ascii_case(c)))
            .filter_map(|c| self.column_expr(c).map(|expr| (quote_identifier(c), expr)))
            .collect()
    }
}

fn text_like(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Integer(x) => Some(x.to_string()),
        ValueRef::Real(x) => Some(x.to_string()),
        ValueRef::Text(x) | ValueRef::Blob(x) => Some(String::from_utf8_lossy(x).into_owned()),
    })
}

/// Map one row of [`SourceLibrary::scan_sql`] to a spectrum without peaks.
pub fn read_ref_spectrum(row: &Row<'_>) -> rusqlite::Result<RefSpectrum> {
    let num_peaks: Option<i64> = row.get(7)?;
    Ok(RefSpectrum {
        id: row.get(0)?,
        peptide_seq: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        precursor_mz: row.get::<_, Option<f64>>(2)?.unwrap_or_default(),
        precursor_charge: row.get::<_, Option<i32>>(3)?.unwrap_or_default(),
        peptide_mod_seq: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        prev_aa: text_like(row, 5)?,
        next_aa: text_like(row, 6)?,
        num_peaks: num_peaks.unwrap_or(0).clamp(0, u32::MAX as i64) as u32,
        score: row.get(8)?,
        score_type: row.get(9)?,
        ion_mobility: row.get(10)?,
        collisional_cross_section: row.get(11)?,
        ion_mobility_high_energy_offset: row.get(12)?,
        ion_mobility_type: row.get(13)?,
        small_molecule: SmallMoleculeInfo {
            molecule_name: text_like(row, 14)?.unwrap_or_default(),
            chemical_formula: text_like(row, 15)?.unwrap_or_default(),
            precursor_adduct: text_like(row, 16)?.unwrap_or_default(),
            inchi_key: text_like(row, 17)?.unwrap_or_default(),
            other_keys: text_like(row, 18)?.unwrap_or_default(),
        },
        start_time: row.get(19)?,
        end_time: row.get(20)?,
        total_ion_current: row.get(21)?,
        retention_time: row.get(22)?,
        spec_id_in_file: text_like(row, 23)?,
        file_id: row.get(24)?,
        raw_peaks: Vec::new(),
        processed_peaks: Vec::new(),
    })
}
