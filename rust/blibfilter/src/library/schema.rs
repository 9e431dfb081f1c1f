//! Table layout of the libraries this crate writes.
use rusqlite::{
    Connection,
    params,
};

use crate::errors::{
    FilterError,
    Result,
};
use crate::scoring::score_types::SCORE_TYPES;

pub const MAJOR_VERSION: i32 = 1;
pub const MINOR_VERSION: i32 = 12;

pub const LSID_PREFIX: &str = "urn:lsid:proteome.gs.washington.edu:spectral_library:bibliospec";

const CREATE_TABLES: &str = r#"
CREATE TABLE LibInfo (
    libLSID TEXT,
    createTime TEXT,
    numSpecs INTEGER,
    majorVersion INTEGER,
    minorVersion INTEGER
);
CREATE TABLE RefSpectra (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    peptideSeq VARCHAR(150),
    precursorMZ REAL,
    precursorCharge INTEGER,
    peptideModSeq VARCHAR(200),
    prevAA CHAR(1),
    nextAA CHAR(1),
    copies INTEGER,
    numPeaks INTEGER,
    ionMobility REAL,
    collisionalCrossSectionSqA REAL,
    ionMobilityHighEnergyOffset REAL,
    ionMobilityType TINYINT,
    retentionTime REAL,
    startTime REAL,
    endTime REAL,
    totalIonCurrent REAL,
    moleculeName VARCHAR(128),
    chemicalFormula VARCHAR(128),
    precursorAdduct VARCHAR(128),
    inchiKey VARCHAR(128),
    otherKeys VARCHAR(128),
    fileID INTEGER,
    SpecIDinFile VARCHAR(256),
    score REAL,
    scoreType TINYINT
);
CREATE TABLE Modifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    RefSpectraID INTEGER,
    position INTEGER,
    mass REAL
);
CREATE TABLE RefSpectraPeaks (
    RefSpectraID INTEGER,
    peakMZ BLOB,
    peakIntensity BLOB
);
CREATE TABLE RefSpectraPeakAnnotations (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    RefSpectraID INTEGER NOT NULL,
    peakIndex INTEGER NOT NULL,
    name VARCHAR(256),
    formula VARCHAR(256),
    inchiKey VARCHAR(256),
    otherKeys VARCHAR(256),
    charge INTEGER,
    adduct VARCHAR(256),
    comment VARCHAR(256),
    mzTheoretical REAL NOT NULL,
    mzObserved REAL NOT NULL
);
CREATE TABLE SpectrumSourceFiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
    fileName VARCHAR(512),
    idFileName VARCHAR(512),
    cutoffScore REAL
);
CREATE TABLE ScoreTypes (
    id INTEGER PRIMARY KEY,
    scoreType VARCHAR(128),
    probabilityType VARCHAR(128)
);
CREATE TABLE IonMobilityTypes (
    id INTEGER PRIMARY KEY,
    ionMobilityType VARCHAR(128)
);
CREATE TABLE RetentionTimes (
    RefSpectraID INTEGER,
    RedundantRefSpectraID INTEGER,
    SpectrumSourceID INTEGER,
    ionMobility REAL,
    collisionalCrossSectionSqA REAL,
    ionMobilityHighEnergyOffset REAL,
    ionMobilityType TINYINT,
    retentionTime REAL,
    startTime REAL,
    endTime REAL,
    score REAL,
    bestSpectrum INTEGER,
    FOREIGN KEY(RefSpectraID) REFERENCES RefSpectra(id)
);
CREATE INDEX idxPeptide ON RefSpectra (peptideSeq, precursorCharge);
CREATE INDEX idxPeptideMod ON RefSpectra (peptideModSeq, precursorCharge);
CREATE INDEX idxMoleculeName ON RefSpectra (moleculeName, precursorAdduct);
CREATE INDEX idxRefIdPeaks ON RefSpectraPeaks (RefSpectraID);
CREATE INDEX idxRefIdPeakAnnotations ON RefSpectraPeakAnnotations (RefSpectraID);
CREATE INDEX idxRefIdModifications ON Modifications (RefSpectraID);
CREATE INDEX idxRetentionTimes ON RetentionTimes (RefSpectraID);
"#;

pub const ION_MOBILITY_TYPES: &[(i64, &str)] = &[
    (0, "none"),
    (1, "driftTime(msec)"),
    (2, "inverseK0(Vsec/cm^2)"),
    (3, "compensation(V)"),
];

/// Create every table of an empty library and fill the lookup tables.
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES)
        .map_err(|e| FilterError::from(e).append_to_context("creating library tables"))?;

    let mut stmt = conn.prepare(
        "INSERT INTO ScoreTypes (id, scoreType, probabilityType) VALUES (?1, ?2, ?3)",
    )?;
    for score_type in SCORE_TYPES {
        stmt.execute(params![
            score_type.id,
            score_type.name,
            score_type.probability_type
        ])?;
    }

    let mut stmt =
        conn.prepare("INSERT INTO IonMobilityTypes (id, ionMobilityType) VALUES (?1, ?2)")?;
    for (id, name) in ION_MOBILITY_TYPES {
        stmt.execute(params![id, name])?;
    }
    Ok(())
}

/// Schema names are interpolated into SQL, so only plain identifiers pass.
pub fn check_schema_name(schema: &str) -> Result<()> {
    let valid = !schema.is_empty()
        && schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !schema.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(FilterError::Config {
            msg: format!("Invalid schema name: {:?}", schema),
        })
    }
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn table_exists(conn: &Connection, schema: &str, table: &str) -> Result<bool> {
    check_schema_name(schema)?;
    let sql = format!(
        "SELECT count(*) FROM {}.sqlite_master WHERE type = 'table' AND name = ?1",
        schema
    );
    let count: i64 = conn.query_row(&sql, [table], |row| row.get(0))?;
    Ok(count > 0)
}

/// Column names of a table, in declaration order. Empty if the table is missing.
pub fn table_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>> {
    check_schema_name(schema)?;
    let sql = format!("PRAGMA {}.table_info({})", schema, quote_identifier(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(columns)
}
