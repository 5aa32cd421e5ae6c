use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn eegprep() -> Command {
    Command::cargo_bin("eegprep").unwrap()
}

fn write_config(dir: &Path, json: &str) -> String {
    let path = dir.join("pipeline.json");
    std::fs::write(&path, json).unwrap();
    path.to_str().unwrap().to_string()
}

// =============================================================================
// GENERAL
// =============================================================================

#[test]
fn test_no_args_shows_help() {
    eegprep()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_version_flag() {
    eegprep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("eegprep"));
}

#[test]
fn test_help_flag() {
    eegprep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("screen EEG recordings"));
}

// =============================================================================
// DEFAULTS SUBCOMMAND
// =============================================================================

#[test]
fn test_defaults_is_valid_config() {
    let output = eegprep().arg("defaults").assert().success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["reference"], "average");
    assert_eq!(parsed["artifacts"]["thresholds"]["z_threshold"], 3.0);
    assert!(parsed["epoch"]["event_codes"].is_array());
}

#[test]
fn test_defaults_round_trip_through_validate() {
    let tmp = tempfile::tempdir().unwrap();
    let output = eegprep().arg("defaults").assert().success();
    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let config = write_config(tmp.path(), &stdout);

    eegprep()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"));
}

// =============================================================================
// VALIDATE SUBCOMMAND
// =============================================================================

#[test]
fn test_validate_nonexistent_file() {
    eegprep()
        .arg("validate")
        .arg("--config")
        .arg("/nonexistent/pipeline.json")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_validate_bad_filter() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(
        tmp.path(),
        r#"{"filter": {"low_freq": 30, "high_freq": 1}, "epoch": {"event_codes": [1]}}"#,
    );

    eegprep()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid filter specification"));
}

#[test]
fn test_validate_json_output() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), r#"{"epoch": {"event_codes": [1, 2]}}"#);

    let output = eegprep()
        .arg("validate")
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["valid"], true);
    assert_eq!(parsed["stages"], serde_json::json!(["epoch"]));
    assert!(parsed["error"].is_null());
}

// =============================================================================
// RUN SUBCOMMAND (argument handling)
// =============================================================================

#[test]
fn test_run_missing_recording_arg() {
    eegprep()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--recording"));
}

#[test]
fn test_run_nonexistent_recording() {
    eegprep()
        .arg("run")
        .arg("--recording")
        .arg("/nonexistent/recording.json")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid recording"));
}

// =============================================================================
// BATCH SUBCOMMAND (argument handling)
// =============================================================================

#[test]
fn test_batch_requires_config() {
    eegprep()
        .arg("batch")
        .arg("--glob")
        .arg("*.json")
        .arg("--output-dir")
        .arg("out")
        .env_remove("EEGPREP_CONFIG")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_batch_no_matches() {
    let tmp = tempfile::tempdir().unwrap();
    let config = write_config(tmp.path(), r#"{"epoch": {"event_codes": [1]}}"#);

    eegprep()
        .arg("batch")
        .arg("--glob")
        .arg("/nonexistent_dir_12345/*.json")
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(tmp.path().join("out").to_str().unwrap())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No matching files"));
}

#[test]
fn test_batch_glob_and_files_conflict() {
    eegprep()
        .arg("batch")
        .arg("--glob")
        .arg("*.json")
        .arg("--files")
        .arg("a.json")
        .arg("--config")
        .arg("pipeline.json")
        .arg("--output-dir")
        .arg("out")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
