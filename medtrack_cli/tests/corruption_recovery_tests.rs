//! Corruption recovery tests for medtrack.
//!
//! These tests verify the system can handle:
//! - Garbage lines in the dose WAL
//! - Individually invalid records in the collection files
//! - A collection file that is not JSON at all

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::io::Write as IoWrite;
use std::path::Path;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("medtrack"));
    cmd.arg("--data-dir")
        .arg(data_dir)
        .env("XDG_CONFIG_HOME", data_dir.join("config"));
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn json(data_dir: &Path, args: &[&str]) -> Value {
    let output = cli(data_dir).arg("--json").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

fn add_aspirin_daily(data_dir: &Path) {
    cli(data_dir)
        .args(["medicine", "add", "--name", "Aspirin", "--dose", "1"])
        .args(["--unit", "tablet", "--stock", "30"])
        .assert()
        .success();
    cli(data_dir)
        .args(["rule", "add", "--medicine", "Aspirin", "--time", "08:00"])
        .assert()
        .success();
}

#[test]
fn test_garbage_wal_lines_are_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_aspirin_daily(data_dir);

    cli(data_dir)
        .args(["take", "Aspirin", "--at", "2024-05-06T08:05"])
        .assert()
        .success();

    // A torn write leaves half a record at the end of the log
    let mut wal = fs::OpenOptions::new()
        .append(true)
        .open(data_dir.join("doses.wal"))
        .unwrap();
    writeln!(wal, "{{ invalid json }}").unwrap();
    write!(wal, "{{\"id\":\"abc\",\"medicine_").unwrap();
    drop(wal);

    let week = json(data_dir, &["adherence", "--start", "2024-05-06"]);
    assert_eq!(week["days"][0]["status"], "COMPLETE");
    assert_eq!(week["days"][0]["taken_count"], 1);
}

#[test]
fn test_rollup_survives_garbage_wal_lines() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_aspirin_daily(data_dir);

    cli(data_dir)
        .args(["take", "Aspirin", "--at", "2024-05-06T08:05"])
        .assert()
        .success();
    let mut wal = fs::OpenOptions::new()
        .append(true)
        .open(data_dir.join("doses.wal"))
        .unwrap();
    writeln!(wal, "not json").unwrap();
    drop(wal);

    let rolled = json(data_dir, &["rollup"]);
    assert_eq!(rolled["rolled_up"], 1);
}

#[test]
fn test_invalid_rule_record_is_skipped_but_kept() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_aspirin_daily(data_dir);

    let path = data_dir.join("schedules.json");
    let mut records: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    records.as_object_mut().unwrap().insert(
        "bogus".to_string(),
        serde_json::json!({ "id": "bogus", "time": "25:99" }),
    );
    fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();

    // The valid rule still drives the schedule
    let schedule = json(data_dir, &["schedule", "--date", "2024-05-06"]);
    assert_eq!(schedule["slots"].as_array().unwrap().len(), 1);

    // A later write keeps the unreadable record for manual repair
    let rules = json(data_dir, &["rule", "list"]);
    let rule_id = rules[0]["id"].as_str().unwrap().to_string();
    cli(data_dir).args(["rule", "pause", &rule_id]).assert().success();

    let contents = fs::read_to_string(&path).unwrap();
    assert!(contents.contains("bogus"));
}

#[test]
fn test_unknown_weekday_code_on_disk_is_dropped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_aspirin_daily(data_dir);

    let path = data_dir.join("schedules.json");
    let contents = fs::read_to_string(&path).unwrap();
    let mut records: Value = serde_json::from_str(&contents).unwrap();
    for rule in records.as_object_mut().unwrap().values_mut() {
        rule["days"] = serde_json::json!(["TUE", "XYZ"]);
    }
    fs::write(&path, serde_json::to_string(&records).unwrap()).unwrap();

    // 2024-05-07 is a Tuesday, 2024-05-06 a Monday
    let tuesday = json(data_dir, &["schedule", "--date", "2024-05-07"]);
    assert_eq!(tuesday["slots"].as_array().unwrap().len(), 1);
    let monday = json(data_dir, &["schedule", "--date", "2024-05-06"]);
    assert!(monday["slots"].as_array().unwrap().is_empty());
}

#[test]
fn test_corrupted_medicines_file_is_an_error() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    add_aspirin_daily(data_dir);

    fs::write(data_dir.join("medicines.json"), "{ invalid json }}}}").unwrap();

    cli(data_dir)
        .args(["schedule", "--date", "2024-05-06"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));

    // Nothing is written on top of the broken file
    cli(data_dir)
        .args(["take", "Aspirin"])
        .assert()
        .failure();
    assert!(!data_dir.join("doses.wal").exists());
}

#[test]
fn test_missing_files_mean_empty_store() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    let medicines = json(data_dir, &["medicine", "list"]);
    assert!(medicines.as_array().unwrap().is_empty());

    let forecasts = json(data_dir, &["forecast", "--today", "2024-05-20"]);
    assert!(forecasts.as_array().unwrap().is_empty());

    let week = json(data_dir, &["adherence", "--start", "2024-05-06"]);
    assert!(week["days"]
        .as_array()
        .unwrap()
        .iter()
        .all(|d| d["status"] == "NONE" && d["expected_count"] == 0));
}
