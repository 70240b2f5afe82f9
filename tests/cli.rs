mod common;

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;

use common::{TestWorkspace, column_names, fixture_path, row_count, shipped_script};

const TINY_CSV: &str = "id,type,date\n1,noise,2023-01-01\n2,parking,2023-02-01\n";

fn nyc311() -> Command {
    Command::cargo_bin("nyc311-db").expect("binary exists")
}

#[test]
fn bare_invocation_uses_default_paths() {
    let workspace = TestWorkspace::new();
    workspace.write("data/raw_311_sample.csv", TINY_CSV);

    nyc311()
        .current_dir(workspace.path())
        .assert()
        .success()
        .stdout(contains("Imported 2 rows into raw_311"))
        .stdout(contains("  raw_311: 2 rows"))
        .stdout(contains("  raw_311_indexed: table not found"))
        .stdout(contains("  raw_311_2023: table not found"))
        .stdout(contains("  clean_311_2023: table not found"))
        .stdout(contains("  clean_311_2023_dedup: table not found"))
        .stdout(contains("Warning: SQL script not found at nyc311_sql_tasks.sql"));

    let db = workspace.path().join("nyc311.db");
    assert_eq!(row_count(&db, "raw_311"), 2);
    assert_eq!(column_names(&db, "raw_311"), vec!["id", "type", "date"]);
}

#[test]
fn missing_csv_exits_with_status_one_and_creates_nothing() {
    let workspace = TestWorkspace::new();

    nyc311()
        .current_dir(workspace.path())
        .assert()
        .code(1)
        .stderr(contains("CSV file not found at data/raw_311_sample.csv"))
        .stdout(contains("rows").not());

    assert!(!workspace.path().join("nyc311.db").exists());
}

#[test]
fn missing_csv_leaves_existing_database_alone() {
    let workspace = TestWorkspace::new();
    let db = workspace.write("old.db", "not really sqlite");

    nyc311()
        .current_dir(workspace.path())
        .args(["--db", "old.db"])
        .assert()
        .code(1);

    assert_eq!(fs::read_to_string(&db).unwrap(), "not really sqlite");
}

#[test]
fn shipped_script_builds_all_derived_tables() {
    let workspace = TestWorkspace::new();
    let db = workspace.path().join("nyc311.db");

    nyc311()
        .args([
            "--csv",
            fixture_path("raw_311_sample.csv").to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--script",
            shipped_script().to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("  raw_311: 8 rows"))
        .stdout(contains("  raw_311_indexed: 8 rows"))
        .stdout(contains("  raw_311_2023: 7 rows"))
        .stdout(contains("  clean_311_2023: 7 rows"))
        .stdout(contains("  clean_311_2023_dedup: 6 rows"))
        .stdout(contains("'clean_311_2023_dedup'"));

    assert_eq!(
        column_names(&db, "raw_311"),
        vec![
            "Unique Key",
            "Created Date",
            "Closed Date",
            "Agency",
            "Complaint Type",
            "Descriptor",
            "Incident Zip",
            "Borough",
            "Status",
        ]
    );
}

#[test]
fn rerun_recreates_database_with_same_counts() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.csv", TINY_CSV);
    let db = workspace.path().join("out.db");

    for _ in 0..2 {
        nyc311()
            .args([
                "--csv",
                csv.to_str().unwrap(),
                "--db",
                db.to_str().unwrap(),
                "--script",
                workspace.path().join("absent.sql").to_str().unwrap(),
            ])
            .assert()
            .success();
        assert_eq!(row_count(&db, "raw_311"), 2);
    }
}

#[test]
fn short_row_aborts_before_transformations() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.csv", "id,type,date\n1,noise,2023-01-01\n2,parking\n");
    let script = workspace.write("tasks.sql", "CREATE TABLE marker (x TEXT);");
    let db = workspace.path().join("out.db");

    nyc311()
        .args([
            "--csv",
            csv.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--script",
            script.to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(contains("row 3 has 2 field(s) but the header declares 3"))
        .stdout(contains("Tables in database").not());

    let conn = rusqlite::Connection::open(&db).unwrap();
    let tables: i64 = conn
        .query_row("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'", [], |row| {
            row.get(0)
        })
        .unwrap();
    assert_eq!(tables, 0);
}

#[test]
fn failing_script_is_a_warning_not_an_error() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.csv", TINY_CSV);
    let script = workspace.write(
        "tasks.sql",
        "CREATE TABLE raw_311_2023 AS SELECT * FROM raw_311 WHERE date LIKE '2023%';\n\
         INSERT INTO missing_table VALUES (1);\n\
         CREATE TABLE clean_311_2023 AS SELECT * FROM raw_311_2023;\n",
    );
    let db = workspace.path().join("out.db");

    nyc311()
        .args([
            "--csv",
            csv.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--script",
            script.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("missing_table"))
        .stdout(contains("  raw_311_2023: 2 rows"))
        .stdout(contains("  clean_311_2023: table not found"));

    nyc311()
        .args([
            "--csv",
            csv.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--script",
            script.to_str().unwrap(),
            "--on-error",
            "continue",
        ])
        .assert()
        .success()
        .stdout(contains("Warning: 1 SQL statement failure(s)"))
        .stdout(contains("  clean_311_2023: 2 rows"));
}

#[test]
fn custom_table_expectations_and_delimiter() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.txt", "Unique Key;Agency\n1;NYPD\n2;DOT\n3;DSNY\n");
    let script = workspace.write(
        "tasks.sql",
        "CREATE TABLE nypd AS SELECT * FROM requests WHERE Agency = 'NYPD';",
    );
    let db = workspace.path().join("out.db");

    nyc311()
        .args([
            "--csv",
            csv.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--script",
            script.to_str().unwrap(),
            "--table",
            "requests",
            "--delimiter",
            ";",
            "--expect",
            "requests,nypd",
        ])
        .assert()
        .success()
        .stdout(contains("  requests: 3 rows"))
        .stdout(contains("  nypd: 1 rows"))
        .stdout(contains("raw_311").not());
}

#[test]
fn report_flag_writes_json_summary() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.csv", TINY_CSV);
    let db = workspace.path().join("out.db");
    let report = workspace.path().join("report.json");

    nyc311()
        .args([
            "--csv",
            csv.to_str().unwrap(),
            "--db",
            db.to_str().unwrap(),
            "--script",
            workspace.path().join("absent.sql").to_str().unwrap(),
            "--report",
            report.to_str().unwrap(),
        ])
        .assert()
        .success();

    let value: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(value["load"]["rows"], 2);
    assert_eq!(value["load"]["columns"], serde_json::json!(["id", "type", "date"]));
    assert_eq!(value["script_outcome"]["status"], "skipped");
    assert_eq!(value["verification"][0]["name"], "raw_311");
    assert_eq!(value["verification"][0]["rows"], 2);
    assert_eq!(value["verification"][1]["status"], "not_found");
}

#[test]
fn unknown_encoding_is_rejected() {
    let workspace = TestWorkspace::new();
    let csv = workspace.write("raw.csv", TINY_CSV);

    nyc311()
        .args(["--csv", csv.to_str().unwrap(), "--input-encoding", "klingon"])
        .current_dir(workspace.path())
        .assert()
        .code(1)
        .stderr(contains("Unknown encoding 'klingon'"));
    assert!(!workspace.path().join("nyc311.db").exists());
}
