use std::path::{
    Path,
    PathBuf,
};

use blibfilter::codec::encode_peaks;
use blibfilter::library::LibraryStore;
use blibfilter::{
    FilterConfig,
    FilterError,
    LibraryError,
    Peak,
    RefSpectrum,
};
use indicatif::ProgressBar;
use rusqlite::Connection;

struct Fixture {
    _dir: tempfile::TempDir,
    redundant: PathBuf,
    filtered: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let redundant = dir.path().join("redundant.blib");
        let filtered = dir.path().join("filtered.blib");
        Self {
            _dir: dir,
            redundant,
            filtered,
        }
    }

    fn run(&self, config: &FilterConfig) -> blibfilter::errors::Result<blibfilter::FilterStats> {
        blibfilter::run(&self.redundant, &self.filtered, config, ProgressBar::hidden())
    }

    fn output(&self) -> Connection {
        Connection::open(&self.filtered).unwrap()
    }
}

fn spectrum(seq: &str, charge: i32) -> RefSpectrum {
    RefSpectrum {
        peptide_seq: seq.to_string(),
        peptide_mod_seq: seq.to_string(),
        precursor_mz: 900.0,
        precursor_charge: charge,
        retention_time: Some(10.0),
        ..Default::default()
    }
}

fn peaks(values: &[(f64, f32)]) -> Vec<Peak> {
    values.iter().map(|&(mz, i)| Peak::new(mz, i)).collect()
}

fn ladder(n: usize) -> Vec<Peak> {
    (0..n)
        .map(|i| Peak::new(150.0 + 25.0 * i as f64, 10.0 + i as f32))
        .collect()
}

fn write_redundant(path: &Path, spectra: &[(RefSpectrum, Vec<Peak>)]) -> Vec<i64> {
    let store = LibraryStore::create(path, None).unwrap();
    let file_id = store.insert_source_file("run1.raw", Some("run1.pep.xml"), Some(0.01)).unwrap();
    spectra
        .iter()
        .map(|(spectrum, peaks)| {
            let spectrum = RefSpectrum {
                file_id: Some(file_id),
                ..spectrum.clone()
            };
            store.insert_spectrum(&spectrum, peaks).unwrap()
        })
        .collect()
}

/// `(RedundantRefSpectraID, bestSpectrum)` for every retention time row of
/// an output spectrum.
fn retention_rows(conn: &Connection, ref_id: i64) -> Vec<(i64, bool)> {
    let mut stmt = conn
        .prepare(
            "SELECT RedundantRefSpectraID, bestSpectrum FROM RetentionTimes \
             WHERE RefSpectraID = ?1 ORDER BY RedundantRefSpectraID",
        )
        .unwrap();
    stmt.query_map([ref_id], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? == 1)))
        .unwrap()
        .collect::<rusqlite::Result<Vec<_>>>()
        .unwrap()
}

fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT count(*) FROM {}", table), [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_pair_keeps_spectrum_with_more_peaks() {
    let fixture = Fixture::new();
    let ids = write_redundant(
        &fixture.redundant,
        &[
            (spectrum("PEPTIDEK", 2), ladder(5)),
            (spectrum("PEPTIDEK", 2), ladder(8)),
        ],
    );

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.groups_written, 1);

    let conn = fixture.output();
    assert_eq!(count(&conn, "RefSpectra"), 1);
    let (ref_id, copies, num_peaks, file_id): (i64, i64, i64, i64) = conn
        .query_row(
            "SELECT id, copies, numPeaks, fileID FROM RefSpectra",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .unwrap();
    assert_eq!(copies, 2);
    assert_eq!(num_peaks, 8);
    assert_eq!(file_id, 1);

    assert_eq!(count(&conn, "RetentionTimes"), 2);
    assert_eq!(
        retention_rows(&conn, ref_id),
        vec![(ids[0], false), (ids[1], true)]
    );

    let (num_specs, lsid): (i64, String) = conn
        .query_row("SELECT numSpecs, libLSID FROM LibInfo", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .unwrap();
    assert_eq!(num_specs, 1);
    assert!(lsid.ends_with(":nr:filtered"));
    assert_eq!(count(&conn, "SpectrumSourceFiles"), 1);
}

#[test]
fn test_single_spectrum_is_kept() {
    let fixture = Fixture::new();
    write_redundant(&fixture.redundant, &[(spectrum("ELVISK", 3), Vec::new())]);

    let config = FilterConfig {
        min_peaks: 0,
        min_score: 0.99,
        ..Default::default()
    };
    fixture.run(&config).unwrap();

    let conn = fixture.output();
    assert_eq!(count(&conn, "RefSpectra"), 1);
    assert_eq!(retention_rows(&conn, 1), vec![(1, true)]);
}

#[test]
fn test_groups_are_written_in_scan_order() {
    let fixture = Fixture::new();
    let shared = ladder(6);
    write_redundant(
        &fixture.redundant,
        &[
            (spectrum("AAB", 2), shared.clone()),
            (spectrum("AAA", 2), shared.clone()),
            (spectrum("AAA", 3), shared.clone()),
            (spectrum("AAA", 2), shared.clone()),
            (spectrum("AAA", 2), shared.clone()),
        ],
    );

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.spectra_read, 5);
    assert_eq!(stats.groups_written, 3);

    let conn = fixture.output();
    let mut stmt = conn
        .prepare("SELECT peptideModSeq, precursorCharge, copies FROM RefSpectra ORDER BY id")
        .unwrap();
    let written: Vec<(String, i32, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(
        written,
        vec![
            ("AAA".to_string(), 2, 3),
            ("AAA".to_string(), 3, 1),
            ("AAB".to_string(), 2, 1),
        ]
    );

    // Identical spectra tie, the first one scanned wins.
    assert_eq!(retention_rows(&conn, 1), vec![(2, true), (4, false), (5, false)]);
    assert_eq!(count(&conn, "RetentionTimes"), 5);
    assert_eq!(stats.retention_times_written, 5);
}

fn outlier_group() -> Vec<(RefSpectrum, Vec<Peak>)> {
    let noise = peaks(&[(151.0, 50.0), (257.0, 5.0), (333.0, 7.0), (420.0, 1.0)]);
    let base = peaks(&[(200.0, 10.0), (300.0, 20.0), (350.0, 5.0), (420.0, 1.0)]);
    let near = peaks(&[(200.0, 11.0), (300.0, 19.0), (350.0, 5.0), (420.0, 1.0)]);
    let near2 = peaks(&[(200.0, 10.0), (300.0, 21.0), (350.0, 4.0), (420.0, 1.0)]);
    vec![
        (spectrum("PEPTIDEK", 2), noise),
        (spectrum("PEPTIDEK", 2), base),
        (spectrum("PEPTIDEK", 2), near),
        (spectrum("PEPTIDEK", 2), near2),
    ]
}

#[test]
fn test_outlier_is_never_the_representative() {
    let fixture = Fixture::new();
    write_redundant(&fixture.redundant, &outlier_group());

    let config = FilterConfig {
        min_score: 0.4,
        ..Default::default()
    };
    fixture.run(&config).unwrap();

    let conn = fixture.output();
    assert_eq!(count(&conn, "RefSpectra"), 1);
    let rows = retention_rows(&conn, 1);
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], (1, false));
    assert_eq!(rows.iter().filter(|(_, best)| *best).count(), 1);
}

#[test]
fn test_low_agreement_group_is_rejected() {
    let fixture = Fixture::new();
    let mut spectra = outlier_group();
    spectra.push((spectrum("OTHERK", 2), ladder(4)));
    write_redundant(&fixture.redundant, &spectra);

    let config = FilterConfig {
        min_score: 0.6,
        ..Default::default()
    };
    let stats = fixture.run(&config).unwrap();
    assert_eq!(stats.groups_rejected, 1);
    assert_eq!(stats.groups_written, 1);

    let conn = fixture.output();
    assert_eq!(count(&conn, "RefSpectra"), 1);
    assert_eq!(count(&conn, "RetentionTimes"), 1);
    let seq: String = conn
        .query_row("SELECT peptideModSeq FROM RefSpectra", [], |row| row.get(0))
        .unwrap();
    assert_eq!(seq, "OTHERK");
}

fn scored(score_type: i64, score: f64, tic: f64) -> RefSpectrum {
    RefSpectrum {
        score: Some(score),
        score_type: Some(score_type),
        total_ion_current: Some(tic),
        ..spectrum("PEPTIDEK", 2)
    }
}

fn best_scoring() -> FilterConfig {
    FilterConfig {
        best_scoring: true,
        ..Default::default()
    }
}

#[test]
fn test_best_score_wins_regardless_of_ion_current() {
    let fixture = Fixture::new();
    let ids = write_redundant(
        &fixture.redundant,
        &[
            (scored(1, 0.05, 1e9), ladder(10)),
            (scored(1, 0.001, 1.0), ladder(3)),
            (scored(1, 0.01, 1e6), ladder(10)),
        ],
    );

    fixture.run(&best_scoring()).unwrap();

    let conn = fixture.output();
    let score: f64 = conn
        .query_row("SELECT score FROM RefSpectra", [], |row| row.get(0))
        .unwrap();
    assert_eq!(score, 0.001);
    assert_eq!(
        retention_rows(&conn, 1),
        vec![(ids[0], false), (ids[1], true), (ids[2], false)]
    );
}

#[test]
fn test_best_score_tie_goes_to_ion_current() {
    let fixture = Fixture::new();
    let ids = write_redundant(
        &fixture.redundant,
        &[
            (scored(12, 3.5, 100.0), ladder(5)),
            (scored(12, 3.5, 500.0), ladder(5)),
            (scored(12, 1.0, 1e9), ladder(5)),
        ],
    );

    fixture.run(&best_scoring()).unwrap();

    let conn = fixture.output();
    let tic: f64 = conn
        .query_row("SELECT totalIonCurrent FROM RefSpectra", [], |row| row.get(0))
        .unwrap();
    assert_eq!(tic, 500.0);
    assert_eq!(
        retention_rows(&conn, 1),
        vec![(ids[0], false), (ids[1], true), (ids[2], false)]
    );
}

fn better_scored_pair() -> Vec<(RefSpectrum, Vec<Peak>)> {
    vec![
        (scored(1, 0.001, 1.0), ladder(3)),
        (scored(1, 0.5, 1.0), ladder(6)),
    ]
}

#[test]
fn test_best_score_beats_peak_count() {
    let fixture = Fixture::new();
    write_redundant(&fixture.redundant, &better_scored_pair());

    fixture.run(&best_scoring()).unwrap();
    let num_peaks: i64 = fixture
        .output()
        .query_row("SELECT numPeaks FROM RefSpectra", [], |row| row.get(0))
        .unwrap();
    assert_eq!(num_peaks, 3);
}

#[test]
fn test_unknown_score_type_falls_back_to_peak_count() {
    let fixture = Fixture::new();
    let mut spectra = better_scored_pair();
    spectra.push((
        RefSpectrum {
            peptide_mod_seq: "QQQK".into(),
            peptide_seq: "QQQK".into(),
            ..scored(0, 0.0, 1.0)
        },
        ladder(2),
    ));
    write_redundant(&fixture.redundant, &spectra);

    let stats = fixture.run(&best_scoring()).unwrap();
    assert_eq!(stats.groups_written, 2);

    let num_peaks: i64 = fixture
        .output()
        .query_row(
            "SELECT numPeaks FROM RefSpectra WHERE peptideModSeq = 'PEPTIDEK'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(num_peaks, 6);
}

#[test]
fn test_corrupt_peaks_do_not_abort() {
    let fixture = Fixture::new();
    write_redundant(
        &fixture.redundant,
        &[
            (spectrum("PEPTIDEK", 2), ladder(6)),
            (spectrum("PEPTIDEK", 2), ladder(6)),
            (spectrum("PEPTIDEK", 2), ladder(6)),
        ],
    );
    let conn = Connection::open(&fixture.redundant).unwrap();
    conn.execute(
        "UPDATE RefSpectraPeaks SET peakIntensity = ?1 WHERE RefSpectraID = 1",
        [vec![0xFFu8; 7]],
    )
    .unwrap();
    drop(conn);

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.unreadable_peaks, 1);
    assert_eq!(stats.groups_written, 1);
    let rows = retention_rows(&fixture.output(), 1);
    assert_eq!(rows, vec![(1, false), (2, true), (3, false)]);
}

#[test]
fn test_corrupt_spectrum_never_wins_a_pair() {
    let fixture = Fixture::new();
    let mut corrupt = ladder(11);
    corrupt[4].intensity = -5.0;
    let ids = write_redundant(
        &fixture.redundant,
        &[
            (spectrum("PEPTIDEK", 2), corrupt),
            (spectrum("PEPTIDEK", 2), ladder(10)),
        ],
    );

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.unreadable_peaks, 1);
    assert_eq!(stats.groups_written, 1);

    let conn = fixture.output();
    let num_peaks: i64 = conn
        .query_row("SELECT numPeaks FROM RefSpectra", [], |row| row.get(0))
        .unwrap();
    assert_eq!(num_peaks, 10);
    assert_eq!(
        retention_rows(&conn, 1),
        vec![(ids[0], false), (ids[1], true)]
    );
}

#[test]
fn test_corrupt_single_spectrum_is_reported_and_kept() {
    let fixture = Fixture::new();
    write_redundant(&fixture.redundant, &[(spectrum("ELVISK", 2), ladder(4))]);
    let conn = Connection::open(&fixture.redundant).unwrap();
    conn.execute(
        "UPDATE RefSpectraPeaks SET peakMZ = ?1 WHERE RefSpectraID = 1",
        [vec![0xFFu8; 5]],
    )
    .unwrap();
    drop(conn);

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.unreadable_peaks, 1);
    assert_eq!(stats.groups_written, 1);
    assert_eq!(retention_rows(&fixture.output(), 1), vec![(1, true)]);
}

#[test]
fn test_oversized_peak_count_is_a_spectrum_error() {
    let fixture = Fixture::new();
    write_redundant(
        &fixture.redundant,
        &[
            (spectrum("PEPTIDEK", 2), ladder(6)),
            (spectrum("PEPTIDEK", 2), ladder(6)),
            (spectrum("PEPTIDEK", 2), ladder(6)),
        ],
    );
    let conn = Connection::open(&fixture.redundant).unwrap();
    conn.execute("UPDATE RefSpectra SET numPeaks = 4000000000 WHERE id = 1", [])
        .unwrap();
    drop(conn);

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.unreadable_peaks, 1);
    assert_eq!(stats.groups_written, 1);
    assert_eq!(
        retention_rows(&fixture.output(), 1),
        vec![(1, false), (2, true), (3, false)]
    );
}

#[test]
fn test_null_and_empty_sequences_group_together() {
    let fixture = Fixture::new();
    write_redundant(
        &fixture.redundant,
        &[
            (spectrum("", 2), ladder(5)),
            (spectrum("", 3), ladder(5)),
            (spectrum("", 2), ladder(5)),
        ],
    );
    let conn = Connection::open(&fixture.redundant).unwrap();
    conn.execute("UPDATE RefSpectra SET peptideModSeq = NULL WHERE id IN (2, 3)", [])
        .unwrap();
    drop(conn);

    let stats = fixture.run(&FilterConfig::default()).unwrap();
    assert_eq!(stats.groups_written, 2);

    let conn = fixture.output();
    let mut stmt = conn
        .prepare("SELECT precursorCharge, copies FROM RefSpectra ORDER BY id")
        .unwrap();
    let written: Vec<(i32, i64)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<rusqlite::Result<_>>()
        .unwrap();
    assert_eq!(written, vec![(2, 2), (3, 1)]);
    assert_eq!(retention_rows(&conn, 1), vec![(1, true), (3, false)]);
}

#[test]
fn test_min_peaks_filter() {
    let fixture = Fixture::new();
    write_redundant(
        &fixture.redundant,
        &[
            (spectrum("PEPTIDEK", 2), ladder(2)),
            (spectrum("PEPTIDEK", 2), ladder(9)),
            (spectrum("SHORTK", 2), ladder(1)),
        ],
    );

    let config = FilterConfig {
        min_peaks: 4,
        ..Default::default()
    };
    let stats = fixture.run(&config).unwrap();
    assert_eq!(stats.skipped_min_peaks, 2);

    let conn = fixture.output();
    assert_eq!(count(&conn, "RefSpectra"), 1);
    assert_eq!(count(&conn, "RetentionTimes"), 1);
}

#[test]
fn test_modifications_and_peaks_are_copied() {
    let fixture = Fixture::new();
    let peaks = peaks(&[(175.119, 30.0), (244.1656, 12.5), (1001.5, 3.0)]);
    write_redundant(
        &fixture.redundant,
        &[(spectrum("PEPM[+16.0]K", 2), peaks.clone())],
    );
    let conn = Connection::open(&fixture.redundant).unwrap();
    conn.execute(
        "INSERT INTO Modifications (RefSpectraID, position, mass) VALUES (1, 4, 15.9949)",
        [],
    )
    .unwrap();
    drop(conn);

    fixture.run(&FilterConfig::default()).unwrap();

    let conn = fixture.output();
    let (position, mass): (i64, f64) = conn
        .query_row(
            "SELECT position, mass FROM Modifications WHERE RefSpectraID = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(position, 4);
    assert_eq!(mass, 15.9949);

    let (mz_blob, intensity_blob): (Vec<u8>, Vec<u8>) = conn
        .query_row(
            "SELECT peakMZ, peakIntensity FROM RefSpectraPeaks WHERE RefSpectraID = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    let decoded = blibfilter::codec::decode_peaks(3, &mz_blob, &intensity_blob).unwrap();
    assert_eq!(decoded, peaks);
}

#[test]
fn test_legacy_column_names() {
    let fixture = Fixture::new();
    let conn = Connection::open(&fixture.redundant).unwrap();
    conn.execute_batch(
        "CREATE TABLE LibInfo (libLSID TEXT, createTime TEXT, numSpecs INTEGER, majorVersion INTEGER, minorVersion INTEGER);
         INSERT INTO LibInfo VALUES ('urn:old', 'then', 1, 1, 1);
         CREATE TABLE RefSpectra (id INTEGER PRIMARY KEY AUTOINCREMENT, peptideSeq VARCHAR(150),
             precursorMZ REAL, precursorCharge INTEGER, peptideModSeq VARCHAR(200), prevAA CHAR(1),
             nextAA CHAR(1), copies INTEGER, numPeaks INTEGER, driftTimeMsec REAL,
             collisionalCrossSection REAL, retentionTime REAL, fileID INTEGER,
             SpecIDinFile VARCHAR(256), score REAL, scoreType TINYINT);
         CREATE TABLE RefSpectraPeaks (RefSpectraID INTEGER, peakMZ BLOB, peakIntensity BLOB);
         CREATE TABLE SpectrumSourceFiles (id INTEGER PRIMARY KEY AUTOINCREMENT, fileName VARCHAR(512));
         INSERT INTO SpectrumSourceFiles (id, fileName) VALUES (7, 'old.raw');
         INSERT INTO RefSpectra (peptideSeq, precursorMZ, precursorCharge, peptideModSeq, prevAA,
             nextAA, copies, numPeaks, driftTimeMsec, collisionalCrossSection, retentionTime,
             fileID, SpecIDinFile, score, scoreType)
             VALUES ('OLDK', 500.5, 2, 'OLDK', '-', 'A', 1, 3, 12.5, 300.0, 42.0, 7, 1234, 0.9, 0);",
    )
    .unwrap();
    let (mz_blob, intensity_blob) = encode_peaks(&ladder(3)).unwrap();
    conn.execute(
        "INSERT INTO RefSpectraPeaks VALUES (1, ?1, ?2)",
        rusqlite::params![mz_blob, intensity_blob],
    )
    .unwrap();
    drop(conn);

    fixture.run(&FilterConfig::default()).unwrap();

    let conn = fixture.output();
    let row: (f64, i64, f64, i64, String) = conn
        .query_row(
            "SELECT ionMobility, ionMobilityType, collisionalCrossSectionSqA, fileID, SpecIDinFile \
             FROM RefSpectra",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .unwrap();
    assert_eq!(row, (12.5, 1, 300.0, 1, "1234".to_string()));

    let (source_id, retention): (i64, f64) = conn
        .query_row(
            "SELECT SpectrumSourceID, retentionTime FROM RetentionTimes",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(source_id, 1);
    assert_eq!(retention, 42.0);
}

#[test]
fn test_missing_redundant_library() {
    let fixture = Fixture::new();
    let err = fixture.run(&FilterConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        FilterError::Library(LibraryError::MissingFile { .. })
    ));
    assert!(!fixture.filtered.exists());
}

#[test]
fn test_existing_output_needs_overwrite() {
    let fixture = Fixture::new();
    write_redundant(&fixture.redundant, &[(spectrum("PEPTIDEK", 2), ladder(4))]);
    std::fs::write(&fixture.filtered, b"keep me").unwrap();

    let err = fixture.run(&FilterConfig::default()).unwrap_err();
    assert!(matches!(
        err,
        FilterError::Library(LibraryError::OutputExists { .. })
    ));
    assert_eq!(std::fs::read(&fixture.filtered).unwrap(), b"keep me");

    let config = FilterConfig {
        overwrite: true,
        ..Default::default()
    };
    fixture.run(&config).unwrap();
    assert_eq!(count(&fixture.output(), "RefSpectra"), 1);
}
