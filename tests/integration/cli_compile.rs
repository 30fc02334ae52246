#![allow(missing_docs)]

#[path = "../common/mod.rs"]
mod common;

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

const DESCENDANTS: &str = r#"{
  "target": "Disease",
  "filters": {"name": "blargh"},
  "edges": ["AliasOf"],
  "history": true
}"#;

fn workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let schema = dir.path().join("schema.json");
    fs::write(&schema, common::SCHEMA_JSON).expect("write schema");
    (dir, schema)
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write file");
    path
}

#[test]
fn compile_prints_the_statement() {
    let (dir, schema) = workspace();
    let query = write(&dir, "query.json", DESCENDANTS);
    let output = cargo_bin_cmd!("cli")
        .args(["--theme", "plain", "compile", "--schema"])
        .arg(&schema)
        .arg(&query)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8(output).expect("utf8");
    assert!(stdout.contains(
        "TRAVERSE out('AliasOf') FROM (SELECT * FROM Disease WHERE name = :param0) MAXDEPTH 50"
    ));
    assert!(stdout.contains("param0"));
}

#[test]
fn compile_emits_json_from_stdin() {
    let (_dir, schema) = workspace();
    let output = cargo_bin_cmd!("cli")
        .args(["--format", "json", "compile", "--schema"])
        .arg(&schema)
        .write_stdin(DESCENDANTS)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(
        json["query"],
        "TRAVERSE out('AliasOf') FROM (SELECT * FROM Disease WHERE name = :param0) MAXDEPTH 50"
    );
    assert_eq!(json["params"]["param0"], "blargh");
    assert_eq!(
        json["display"],
        "TRAVERSE out('AliasOf') FROM (SELECT * FROM Disease WHERE name = \"blargh\") MAXDEPTH 50"
    );
}

#[test]
fn compile_rejects_unknown_classes() {
    let (dir, schema) = workspace();
    let query = write(&dir, "query.json", r#"{"target": "Blargh"}"#);
    let output = cargo_bin_cmd!("cli")
        .args(["compile", "--schema"])
        .arg(&schema)
        .arg(&query)
        .assert()
        .failure()
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8(output).expect("utf8");
    assert!(stderr.contains("Invalid target class (Blargh)"), "{stderr}");
}

#[test]
fn classes_lists_terminal_classes() {
    let (_dir, schema) = workspace();
    let output = cargo_bin_cmd!("cli")
        .args(["--format", "json", "classes", "--terminal", "--schema"])
        .arg(&schema)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let names: Vec<String> = serde_json::from_slice(&output).expect("valid json");
    assert!(names.iter().any(|name| name == "Disease"));
    assert!(!names.iter().any(|name| name == "Ontology"));
}

#[test]
fn select_trims_canned_records() {
    let (dir, schema) = workspace();
    let query = write(&dir, "query.json", r#"{"target": "Disease"}"#);
    let records = write(
        &dir,
        "records.json",
        r##"[
          {"@rid": "#12:0", "@class": "Disease", "name": "cancer"},
          {"@rid": "#12:1", "@class": "Disease", "name": "old", "deletedAt": 1600000000}
        ]"##,
    );
    let output = cargo_bin_cmd!("cli")
        .args(["--format", "json", "select", "--exactly", "1", "--schema"])
        .arg(&schema)
        .arg("--records")
        .arg(&records)
        .arg(&query)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let rows: Vec<Value> = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["@rid"], "#12:0");
}

#[test]
fn select_enforces_exact_count() {
    let (dir, schema) = workspace();
    let query = write(&dir, "query.json", r#"{"target": "Disease"}"#);
    let records = write(&dir, "records.json", "[]");
    cargo_bin_cmd!("cli")
        .args(["select", "--exactly", "1", "--schema"])
        .arg(&schema)
        .arg("--records")
        .arg(&records)
        .arg(&query)
        .assert()
        .failure();
}

#[test]
fn config_reads_the_query_table() {
    let dir = TempDir::new().expect("tempdir");
    let config = write(&dir, "query.toml", "[query]\nmax_limit = 250\n");
    let output = cargo_bin_cmd!("cli")
        .args(["--format", "json", "config", "--config"])
        .arg(&config)
        .env_remove("GKB_QUERY_MAX_LIMIT")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["max_limit"], 250);
    assert_eq!(json["max_neighbors"], 4);
}
