//! Corruption recovery tests for peptrack.
//!
//! These tests verify the system can handle:
//! - Corrupted dose log lines
//! - Partial writes
//! - Corrupted catalog files
//! - Malformed dosing data in an otherwise valid catalog

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("peptrack"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn write_catalog(temp_dir: &TempDir, substance: &str) {
    let catalog = format!(
        r#"{{
            "patients": [{{ "id": "pat-1", "clinicId": "clinic-a", "name": "Jordan Lee" }}],
            "protocols": [{{
                "id": "proto-1",
                "patientId": "pat-1",
                "clinicId": "clinic-a",
                "name": "Recovery",
                "startDate": "2024-01-01",
                "substances": [{}]
            }}]
        }}"#,
        substance
    );
    fs::write(temp_dir.path().join("catalog.json"), catalog).expect("Failed to write catalog");
}

const VALID_SUBSTANCE: &str = r#"{
    "substanceId": "bpc157",
    "substanceName": "BPC-157",
    "dose": 250,
    "doseUnit": "mcg",
    "frequency": "daily"
}"#;

#[test]
fn test_corrupted_dose_log_lines_skipped() {
    let temp_dir = setup_test_dir();
    write_catalog(&temp_dir, VALID_SUBSTANCE);

    let log_dir = temp_dir.path().join("log");
    fs::create_dir_all(&log_dir).unwrap();
    let record = r#"{"id":"6f1c5c38-8d3f-4a4e-9b7a-2f0c1b7e9d11","patientId":"pat-1","substanceId":"bpc157","doseAmount":"250","status":"taken","loggedAt":"2024-02-02T08:00:00Z"}"#;
    fs::write(
        log_dir.join("doses.jsonl"),
        format!("{{ invalid json }}\n{}\n{{ more invalid }}\n", record),
    )
    .expect("Failed to write corrupted log");

    let output = cli()
        .arg("stats")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--patient")
        .arg("pat-1")
        .arg("--start")
        .arg("2024-02-01")
        .arg("--end")
        .arg("2024-02-28")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["stats"]["totalDoses"], 1);
}

#[test]
fn test_partial_write_then_append() {
    let temp_dir = setup_test_dir();
    write_catalog(&temp_dir, VALID_SUBSTANCE);

    let log_dir = temp_dir.path().join("log");
    fs::create_dir_all(&log_dir).unwrap();

    // Simulate a crash mid-write: no trailing newline
    let mut file = fs::File::create(log_dir.join("doses.jsonl")).unwrap();
    file.write_all(br#"{"id":"6f1c5c38-8d3f"#).unwrap();
    drop(file);

    cli()
        .arg("log-dose")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--patient")
        .arg("pat-1")
        .arg("--substance")
        .arg("bpc157")
        .arg("--amount")
        .arg("250")
        .arg("--status")
        .arg("taken")
        .arg("--at")
        .arg("2024-02-03T08:00:00Z")
        .assert()
        .success();

    // The new record is glued onto the partial line; neither parses, and
    // the command reading them must still succeed
    cli()
        .arg("stats")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--patient")
        .arg("pat-1")
        .arg("--start")
        .arg("2024-02-01")
        .arg("--end")
        .arg("2024-02-28")
        .assert()
        .success();
}

#[test]
fn test_corrupted_catalog_fails_loudly() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("catalog.json"), "{ invalid json }}}}").unwrap();

    cli()
        .arg("schedule")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--protocol")
        .arg("proto-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));
}

#[test]
fn test_missing_catalog_is_not_found() {
    let temp_dir = setup_test_dir();

    cli()
        .arg("schedule")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--protocol")
        .arg("proto-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));
}

#[test]
fn test_malformed_titration_plan_rejected() {
    let temp_dir = setup_test_dir();
    write_catalog(
        &temp_dir,
        r#"{
            "substanceId": "sema",
            "substanceName": "Semaglutide",
            "titrationPlan": {
                "weeks": [
                    { "week": 4, "dose": 1, "unit": "mg", "frequency": "weekly" },
                    { "week": 2, "dose": 0.5, "unit": "mg", "frequency": "weekly" }
                ]
            }
        }"#,
    );

    cli()
        .arg("schedule")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--protocol")
        .arg("proto-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidDefinition"))
        .stderr(predicate::str::contains("sema"));
}

#[test]
fn test_non_positive_cycle_rejected() {
    let temp_dir = setup_test_dir();
    write_catalog(
        &temp_dir,
        r#"{
            "substanceId": "ipa",
            "substanceName": "Ipamorelin",
            "dose": 200,
            "doseUnit": "mcg",
            "frequency": "daily",
            "cycleOnWeeks": 0,
            "cycleOffWeeks": 4
        }"#,
    );

    cli()
        .arg("schedule")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .arg("--protocol")
        .arg("proto-1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("InvalidDefinition"));
}
