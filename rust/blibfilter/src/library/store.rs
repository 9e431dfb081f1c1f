use std::collections::HashMap;
use std::path::{
    Path,
    PathBuf,
};

use rusqlite::{
    Connection,
    OptionalExtension,
    params,
};
use tracing::{
    debug,
    info,
};

use super::schema::{
    self,
    LSID_PREFIX,
    MAJOR_VERSION,
    MINOR_VERSION,
    check_schema_name,
    quote_identifier,
    table_columns,
    table_exists,
};
use super::source::{
    REQUIRED_SPECTRA_COLUMNS,
    SchemaVersion,
    SourceLibrary,
};
use crate::codec::encode_peaks;
use crate::errors::{
    FilterError,
    LibraryError,
    Result,
};
use crate::models::{
    Peak,
    RefSpectrum,
    RetentionTimeRow,
};

/// A library file open for writing, with other libraries attached to read from.
///
/// Everything the filter needs from SQLite goes through here. Methods that
/// only read or append take `&self` so a scan over an attached library can
/// stay open while spectra are written.
pub struct LibraryStore {
    conn: Connection,
    path: PathBuf,
    /// Per attached schema, source file id to the id in this library.
    file_ids: HashMap<String, HashMap<i64, i64>>,
}

impl LibraryStore {
    /// Create a new, empty library at `path`.
    pub fn create(path: &Path, memory_cache_mb: Option<u32>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            FilterError::from(e).append_to_context(&format!("creating {}", path.display()))
        })?;
        if let Some(mb) = memory_cache_mb {
            // Negative cache sizes are in KiB.
            conn.execute_batch(&format!("PRAGMA cache_size = -{}", mb as u64 * 1024))?;
        }
        schema::create_tables(&conn)?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let create_time = chrono::Local::now().format("%a %b %e %H:%M:%S %Y").to_string();
        conn.execute(
            "INSERT INTO LibInfo (libLSID, createTime, numSpecs, majorVersion, minorVersion) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                format!("{}:nr:{}", LSID_PREFIX, stem),
                create_time,
                -1,
                MAJOR_VERSION,
                MINOR_VERSION
            ],
        )?;
        debug!("Created library at {}", path.display());

        Ok(Self {
            conn,
            path: path.to_path_buf(),
            file_ids: HashMap::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn execute(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    pub fn attach(&self, path: &Path, schema: &str) -> Result<()> {
        check_schema_name(schema)?;
        if !path.exists() {
            return Err(LibraryError::MissingFile {
                path: path.to_path_buf(),
            }
            .into());
        }
        self.conn
            .execute(
                &format!("ATTACH DATABASE ?1 AS {}", schema),
                [path.to_string_lossy()],
            )
            .map_err(|e| {
                FilterError::from(e).append_to_context(&format!("attaching {}", path.display()))
            })?;
        Ok(())
    }

    pub fn detach(&self, schema: &str) -> Result<()> {
        check_schema_name(schema)?;
        self.conn.execute_batch(&format!("DETACH DATABASE {}", schema))?;
        Ok(())
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    pub fn end_transaction(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    /// Record the final spectrum count and end the open transaction.
    pub fn commit(&self) -> Result<()> {
        self.update_spectrum_count()?;
        self.end_transaction()
    }

    pub fn update_spectrum_count(&self) -> Result<usize> {
        let count = self.get_spectrum_count("main")?;
        self.conn
            .execute("UPDATE LibInfo SET numSpecs = ?1", [count as i64])?;
        Ok(count)
    }

    pub fn get_spectrum_count(&self, schema: &str) -> Result<usize> {
        check_schema_name(schema)?;
        let count: i64 = self.conn.query_row(
            &format!("SELECT count(*) FROM {}.RefSpectra", schema),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Check the shape of an attached library and record what it has.
    pub fn describe_source(&self, schema: &str) -> Result<SourceLibrary> {
        check_schema_name(schema)?;
        for table in ["RefSpectra", "RefSpectraPeaks"] {
            if !table_exists(&self.conn, schema, table)? {
                return Err(LibraryError::MissingTable {
                    schema: schema.to_string(),
                    table,
                }
                .into());
            }
        }

        let spectra_columns = table_columns(&self.conn, schema, "RefSpectra")?;
        for &column in REQUIRED_SPECTRA_COLUMNS {
            if !spectra_columns.iter().any(|c| c.eq_ignore_ascii_case(column)) {
                return Err(LibraryError::MissingColumn {
                    schema: schema.to_string(),
                    table: "RefSpectra",
                    column,
                }
                .into());
            }
        }

        let version = if table_exists(&self.conn, schema, "LibInfo")? {
            let columns = table_columns(&self.conn, schema, "LibInfo")?;
            let minor = if columns.iter().any(|c| c == "minorVersion") {
                "minorVersion"
            } else {
                "0"
            };
            self.conn
                .query_row(
                    &format!("SELECT majorVersion, {} FROM {}.LibInfo", minor, schema),
                    [],
                    |row| {
                        Ok(SchemaVersion {
                            major: row.get::<_, Option<i32>>(0)?.unwrap_or_default(),
                            minor: row.get::<_, Option<i32>>(1)?.unwrap_or_default(),
                        })
                    },
                )
                .optional()?
                .unwrap_or_default()
        } else {
            SchemaVersion::default()
        };

        let annotation_columns = table_columns(&self.conn, schema, "RefSpectraPeakAnnotations")?;
        let source_file_columns = table_columns(&self.conn, schema, "SpectrumSourceFiles")?;
        let mut source = SourceLibrary {
            schema: schema.to_string(),
            version,
            spectra_columns,
            annotation_columns,
            has_modifications: table_exists(&self.conn, schema, "Modifications")?,
            has_source_files: !source_file_columns.is_empty(),
            source_file_columns,
            has_score_types: table_exists(&self.conn, schema, "ScoreTypes")?,
            has_ion_mobility_types: table_exists(&self.conn, schema, "IonMobilityTypes")?,
            spectrum_transfer_sql: String::new(),
        };
        let output_columns = table_columns(&self.conn, "main", "RefSpectra")?;
        source.spectrum_transfer_sql = source.spectrum_transfer_sql(&output_columns);
        info!(
            "Library {} is schema version {} with {} spectrum columns",
            schema,
            source.version,
            source.spectra_columns.len()
        );
        Ok(source)
    }

    /// Copy score type and ion mobility type definitions so ids keep meaning.
    pub fn transfer_lookup_tables(&self, source: &SourceLibrary) -> Result<()> {
        if source.has_score_types {
            let columns = table_columns(&self.conn, &source.schema, "ScoreTypes")?;
            let probability = if columns.iter().any(|c| c == "probabilityType") {
                "probabilityType"
            } else {
                "NULL"
            };
            self.conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO main.ScoreTypes (id, scoreType, probabilityType) \
                     SELECT id, scoreType, {} FROM {}.ScoreTypes",
                    probability, source.schema
                ),
                [],
            )?;
        }
        if source.has_ion_mobility_types {
            self.conn.execute(
                &format!(
                    "INSERT OR REPLACE INTO main.IonMobilityTypes (id, ionMobilityType) \
                     SELECT id, ionMobilityType FROM {}.IonMobilityTypes",
                    source.schema
                ),
                [],
            )?;
        }
        Ok(())
    }

    /// Copy every source file of an attached library, remembering the new ids.
    pub fn transfer_spectrum_files(&mut self, source: &SourceLibrary) -> Result<usize> {
        let mut mapping = HashMap::new();
        if source.has_source_files {
            let optional = |name: &str| {
                if source.source_file_columns.iter().any(|c| c == name) {
                    quote_identifier(name)
                } else {
                    "NULL".to_string()
                }
            };
            let sql = format!(
                "SELECT id, fileName, {}, {} FROM {}.SpectrumSourceFiles ORDER BY id",
                optional("idFileName"),
                optional("cutoffScore"),
                source.schema
            );
            let mut select = self.conn.prepare(&sql)?;
            let mut insert = self.conn.prepare(
                "INSERT INTO main.SpectrumSourceFiles (fileName, idFileName, cutoffScore) \
                 VALUES (?1, ?2, ?3)",
            )?;
            let rows = select.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                ))
            })?;
            for row in rows {
                let (old_id, file_name, id_file_name, cutoff) = row?;
                insert.execute(params![file_name, id_file_name, cutoff])?;
                mapping.insert(old_id, self.conn.last_insert_rowid());
            }
        }
        let n_files = mapping.len();
        debug!("Transferred {} source files from {}", n_files, source.schema);
        self.file_ids.insert(source.schema.clone(), mapping);
        Ok(n_files)
    }

    /// The id in this library of a source file from an attached library.
    pub fn map_file_id(&self, schema: &str, source_file_id: Option<i64>) -> Option<i64> {
        let source_file_id = source_file_id?;
        self.file_ids.get(schema)?.get(&source_file_id).copied()
    }

    /// The id in this library of the source file a spectrum came from.
    pub fn get_new_file_id(&self, schema: &str, source_row_id: i64) -> Result<Option<i64>> {
        check_schema_name(schema)?;
        let file_id: Option<Option<i64>> = self
            .conn
            .prepare_cached(&format!("SELECT fileID FROM {}.RefSpectra WHERE id = ?1", schema))?
            .query_row([source_row_id], |row| row.get(0))
            .optional()?;
        Ok(self.map_file_id(schema, file_id.flatten()))
    }

    /// Score types assigned to at least one spectrum, with their names.
    pub fn observed_score_types(
        &self,
        source: &SourceLibrary,
    ) -> Result<Vec<(Option<i64>, Option<String>)>> {
        let sql = match source.column_expr("scoreType") {
            None => format!("SELECT DISTINCT NULL, NULL FROM {}.RefSpectra", source.schema),
            Some(score_type) if source.has_score_types => format!(
                "SELECT DISTINCT r.{st}, s.scoreType FROM {schema}.RefSpectra r \
                 LEFT JOIN {schema}.ScoreTypes s ON r.{st} = s.id ORDER BY r.{st}",
                st = score_type,
                schema = source.schema
            ),
            Some(score_type) => format!(
                "SELECT DISTINCT {st}, NULL FROM {schema}.RefSpectra ORDER BY {st}",
                st = score_type,
                schema = source.schema
            ),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let observed = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(observed)
    }

    /// Raw `(mz, intensity)` blobs of a spectrum in an attached library.
    pub fn get_peak_blobs(
        &self,
        source: &SourceLibrary,
        source_row_id: i64,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let sql = format!(
            "SELECT peakMZ, peakIntensity FROM {}.RefSpectraPeaks WHERE RefSpectraID = ?1",
            source.schema
        );
        let blobs = self
            .conn
            .prepare_cached(&sql)?
            .query_row([source_row_id], |row| {
                Ok((
                    row.get::<_, Option<Vec<u8>>>(0)?.unwrap_or_default(),
                    row.get::<_, Option<Vec<u8>>>(1)?.unwrap_or_default(),
                ))
            })
            .optional()?;
        Ok(blobs)
    }

    /// Copy one spectrum, with its peaks, modifications and annotations,
    /// from an attached library. Returns the new spectrum id.
    pub fn transfer_spectrum(
        &self,
        source: &SourceLibrary,
        source_row_id: i64,
        group_size: usize,
    ) -> Result<i64> {
        let file_id = self.get_new_file_id(&source.schema, source_row_id)?;
        let inserted = self
            .conn
            .prepare_cached(&source.spectrum_transfer_sql)?
            .execute(params![group_size as i64, file_id, source_row_id])?;
        if inserted != 1 {
            return Err(FilterError::Sqlite {
                source: rusqlite::Error::QueryReturnedNoRows,
                context: format!("spectrum {} not found in {}", source_row_id, source.schema),
            });
        }
        let new_id = self.conn.last_insert_rowid();

        self.conn
            .prepare_cached(&format!(
                "INSERT INTO main.RefSpectraPeaks (RefSpectraID, peakMZ, peakIntensity) \
                 SELECT ?1, peakMZ, peakIntensity FROM {}.RefSpectraPeaks WHERE RefSpectraID = ?2",
                source.schema
            ))?
            .execute(params![new_id, source_row_id])?;

        if source.has_modifications {
            self.conn
                .prepare_cached(&format!(
                    "INSERT INTO main.Modifications (RefSpectraID, position, mass) \
                     SELECT ?1, position, mass FROM {}.Modifications WHERE RefSpectraID = ?2",
                    source.schema
                ))?
                .execute(params![new_id, source_row_id])?;
        }

        let annotation_columns: Vec<String> = source
            .annotation_columns
            .iter()
            .filter(|c| *c != "id" && *c != "RefSpectraID")
            .map(|c| quote_identifier(c))
            .collect();
        if !annotation_columns.is_empty() {
            let columns = annotation_columns.join(", ");
            self.conn
                .prepare_cached(&format!(
                    "INSERT INTO main.RefSpectraPeakAnnotations (RefSpectraID, {cols}) \
                     SELECT ?1, {cols} FROM {schema}.RefSpectraPeakAnnotations WHERE RefSpectraID = ?2",
                    cols = columns,
                    schema = source.schema
                ))?
                .execute(params![new_id, source_row_id])?;
        }

        Ok(new_id)
    }

    pub fn insert_retention_time(&self, row: &RetentionTimeRow) -> Result<()> {
        self.conn
            .prepare_cached(
                "INSERT INTO main.RetentionTimes (RefSpectraID, RedundantRefSpectraID, \
                 SpectrumSourceID, ionMobility, collisionalCrossSectionSqA, \
                 ionMobilityHighEnergyOffset, ionMobilityType, retentionTime, startTime, \
                 endTime, score, bestSpectrum) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?
            .execute(params![
                row.ref_spectra_id,
                row.redundant_ref_spectra_id,
                row.spectrum_source_id,
                row.ion_mobility,
                row.collisional_cross_section,
                row.ion_mobility_high_energy_offset,
                row.ion_mobility_type,
                row.retention_time,
                row.start_time,
                row.end_time,
                row.score,
                row.best_spectrum as i64,
            ])?;
        Ok(())
    }

    pub fn insert_source_file(
        &self,
        file_name: &str,
        id_file_name: Option<&str>,
        cutoff_score: Option<f64>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO main.SpectrumSourceFiles (fileName, idFileName, cutoffScore) VALUES (?1, ?2, ?3)",
            params![file_name, id_file_name, cutoff_score],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Append a spectrum with its peaks to this library. The spectrum id and
    /// `num_peaks` are taken from the insert, not from `spectrum`.
    pub fn insert_spectrum(&self, spectrum: &RefSpectrum, peaks: &[Peak]) -> Result<i64> {
        let sm = &spectrum.small_molecule;
        let opt_text = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        self.conn
            .prepare_cached(
                "INSERT INTO main.RefSpectra (peptideSeq, precursorMZ, precursorCharge, \
                 peptideModSeq, prevAA, nextAA, copies, numPeaks, ionMobility, \
                 collisionalCrossSectionSqA, ionMobilityHighEnergyOffset, ionMobilityType, \
                 retentionTime, startTime, endTime, totalIonCurrent, moleculeName, \
                 chemicalFormula, precursorAdduct, inchiKey, otherKeys, fileID, SpecIDinFile, \
                 score, scoreType) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                 ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24)",
            )?
            .execute(params![
                spectrum.peptide_seq,
                spectrum.precursor_mz,
                spectrum.precursor_charge,
                spectrum.peptide_mod_seq,
                spectrum.prev_aa,
                spectrum.next_aa,
                peaks.len() as i64,
                spectrum.ion_mobility,
                spectrum.collisional_cross_section,
                spectrum.ion_mobility_high_energy_offset,
                spectrum.ion_mobility_type,
                spectrum.retention_time,
                spectrum.start_time,
                spectrum.end_time,
                spectrum.total_ion_current,
                opt_text(&sm.molecule_name),
                opt_text(&sm.chemical_formula),
                opt_text(&sm.precursor_adduct),
                opt_text(&sm.inchi_key),
                opt_text(&sm.other_keys),
                spectrum.file_id,
                spectrum.spec_id_in_file,
                spectrum.score,
                spectrum.score_type,
            ])?;
        let id = self.conn.last_insert_rowid();

        let (mz_blob, intensity_blob) = encode_peaks(peaks)?;
        self.conn
            .prepare_cached(
                "INSERT INTO main.RefSpectraPeaks (RefSpectraID, peakMZ, peakIntensity) VALUES (?1, ?2, ?3)",
            )?
            .execute(params![id, mz_blob, intensity_blob])?;
        Ok(id)
    }
}
