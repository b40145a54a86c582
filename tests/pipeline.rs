mod common;

use std::fs;

use common::{TestWorkspace, bin, json_dir};
use mining_facts::store::FactStore;
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn ingest_registers_reports_parameters_and_facts() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();

    let store = FactStore::open(&db).expect("open store");
    let counts = store.counts().expect("counts");
    assert_eq!(counts.reports, 4);
    assert_eq!(counts.facts, 38);

    let report = store.report("A-001").expect("query").expect("report A");
    assert_eq!(report.report_type, "lhir");
    assert_eq!(report.filing_year.as_deref(), Some("2021"));
    assert!(report.is_new);
    assert_eq!(report.pages, Some(150));

    let fallback = store.report("D-004").expect("query").expect("report D");
    assert_eq!(fallback.filing_year, None);
    assert!(!fallback.is_new);
    assert_eq!(store.is_flagged("A-001", "country").expect("flag"), Some(false));
}

#[test]
fn repeated_ingest_keeps_fact_count() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    bin()
        .args([
            "ingest",
            "--json-dir",
            json_dir().to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--in-memory",
        ])
        .assert()
        .success();
    let store = FactStore::open(&db).expect("open store");
    assert_eq!(store.counts().expect("counts").facts, 38);
}

#[test]
fn ingest_skips_unreadable_documents() {
    let workspace = TestWorkspace::new();
    let docs = workspace.path().join("docs");
    workspace.write(
        "docs/good.json",
        r#"{"metadata": {"pdf_filename": "good.pdf"}, "faf": {"a": {"final_values": {"country": "Ghana"}}}}"#,
    );
    workspace.write("docs/broken.json", "{ not json");
    workspace.write("docs/readme.txt", "ignored");
    let db = workspace.join("facts.db");
    bin()
        .args([
            "ingest",
            "--json-dir",
            docs.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
        ])
        .assert()
        .success();
    let store = FactStore::open(&db).expect("open store");
    let counts = store.counts().expect("counts");
    assert_eq!(counts.reports, 1);
    assert_eq!(counts.facts, 1);
}

#[test]
fn export_writes_one_row_per_report() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    let output = workspace.join("wide.csv");
    bin()
        .args([
            "export",
            "--db",
            db.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();

    let mut reader = csv::Reader::from_path(&output).expect("open export");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(&headers[0], "report_id");
    assert!(headers.iter().any(|h| h == "deposit_type"));
    let ids: Vec<String> = reader
        .records()
        .map(|r| r.expect("record")[0].to_string())
        .collect();
    assert_eq!(ids, vec!["A-001", "B-002", "C-003", "D-004"]);
    let raw = fs::read_to_string(&output).expect("read export");
    assert!(raw.contains(r#"[""Porphyry (Cu-Au)"",""Skarn""]"#));
}

#[test]
fn preview_reads_checkpoint() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    let output = workspace.join("wide.csv");
    bin()
        .args(["export", "--db", db.to_str().unwrap(), "-o", output.to_str().unwrap()])
        .assert()
        .success();
    bin()
        .args([
            "preview",
            "-i",
            output.to_str().unwrap(),
            "--rows",
            "2",
            "-C",
            "country,life_of_mine",
        ])
        .assert()
        .success()
        .stdout(contains("report_id"))
        .stdout(contains("A-001"))
        .stdout(contains("Peru"))
        .stdout(contains("C-003").not());
}

#[test]
fn summary_report_covers_every_column_kind() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    let report = workspace.join("reports/overall_summary.txt");
    bin()
        .args([
            "summary",
            "--db",
            db.to_str().unwrap(),
            "-o",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();

    let text = fs::read_to_string(&report).expect("read summary");
    assert!(text.contains("Overall Summary Report"));
    assert!(text.contains("--- Numerical Summary for: 'stripping_ratio' ---"));
    assert!(text.contains("--- Null Summary for: 'report_id' ---"));
    assert!(text.contains("--- Error: Column 'total_ore_mined' not found in table. ---"));
    assert!(text.contains("--- Qualitative Summary for: 'processing_method' ---"));
    assert!(text.contains("Flotation, Heap leach"));
    assert!(text.contains("--- Qualitative Summary for: 'country' ---"));
}

#[test]
fn frequency_modes_count_labels() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    bin()
        .args([
            "frequency",
            "--db",
            db.to_str().unwrap(),
            "-C",
            "deposit_type",
            "--mode",
            "exploded",
        ])
        .assert()
        .success()
        .stdout(contains("Column: deposit_type"))
        .stdout(contains("Porphyry"))
        .stdout(contains("Epithermal"))
        .stdout(contains("(Cu-Au)").not());

    bin()
        .args([
            "frequency",
            "--db",
            db.to_str().unwrap(),
            "-C",
            "country",
            "--include-null",
        ])
        .assert()
        .success()
        .stdout(contains("Canada"));
}

#[test]
fn frequency_reports_missing_column_and_continues() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    bin()
        .args([
            "frequency",
            "--db",
            db.to_str().unwrap(),
            "-C",
            "country,no_such_column,mine_type",
        ])
        .assert()
        .success()
        .stdout(contains("Column: country"))
        .stdout(contains("Column 'no_such_column' not found in table"))
        .stdout(contains("Column: mine_type"));
}

#[test]
fn frequency_fails_when_no_column_exists() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    bin()
        .args(["frequency", "--db", db.to_str().unwrap(), "-C", "no_such_column"])
        .assert()
        .failure()
        .stdout(contains("Column 'no_such_column' not found in table"))
        .stderr(contains("None of the requested columns"));
}

#[test]
fn analyze_writes_commodity_breakdown() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    let report = workspace.join("reports/analysis_report.txt");
    bin()
        .args([
            "analyze",
            "--db",
            db.to_str().unwrap(),
            "-o",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();
    let text = fs::read_to_string(&report).expect("read analysis");
    assert!(text.starts_with("Analysis Report for 4 Mine Studies"));
    assert!(text.contains("Total mines producing Copper: 2"));
    assert!(text.contains("Total mines producing Gold: 2"));
    assert!(text.contains("Warning: Column 'produces_zinc' not found."));
    assert!(text.contains("USD"));
}

#[test]
fn open_pit_writes_report_and_plots() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    let reports = workspace.join("reports");
    bin()
        .args([
            "open-pit",
            "--db",
            db.to_str().unwrap(),
            "--reports-dir",
            reports.to_str().unwrap(),
        ])
        .assert()
        .success();
    let text = fs::read_to_string(reports.join("openpit_report.txt")).expect("read report");
    assert!(text.contains("This report is based on 3 studies with an open pit component."));
    assert!(text.contains("Porphyry, Skarn"));
    assert!(text.contains("Statistics for Calculated Mining Rate (tonnes per day):"));
    assert!(reports.join("mining_rate_histogram.svg").exists());
    assert!(reports.join("mining_rate_boxplot.svg").exists());
}

#[test]
fn combinations_write_report_keys() {
    let workspace = TestWorkspace::new();
    let db = workspace.ingest_fixtures();
    let output = workspace.join("reports/processing/processing_method.txt");
    bin()
        .args([
            "combinations",
            "--db",
            db.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .assert()
        .success();
    let lines = fs::read_to_string(&output).expect("read keys");
    let lines: Vec<&str> = lines.lines().collect();
    assert_eq!(
        lines,
        vec![
            "A-001\tFlotation, Heap leach",
            "B-002\tFlotation, Heap leach",
            "C-003\tUnknown",
            "D-004\tUnknown",
        ]
    );
}

#[test]
fn missing_store_is_reported() {
    let workspace = TestWorkspace::new();
    bin()
        .args([
            "summary",
            "--db",
            workspace.join("absent.db").to_str().unwrap(),
            "-o",
            workspace.join("out.txt").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("not found"));
}
