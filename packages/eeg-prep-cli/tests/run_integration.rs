use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};

fn eegprep() -> Command {
    Command::cargo_bin("eegprep").unwrap()
}

/// 3 channels at 128 Hz for 8 s with code-1 events at 2 s and 5 s.
fn write_recording(dir: &Path, name: &str) -> PathBuf {
    let fs = 128.0;
    let samples: Vec<Vec<f64>> = (0..1024)
        .map(|t| {
            let time = t as f64 / fs;
            (0..3)
                .map(|c| (2.0 * std::f64::consts::PI * 8.0 * time).sin() * (c + 1) as f64)
                .collect()
        })
        .collect();
    let recording = serde_json::json!({
        "sample_rate": fs,
        "channel_labels": ["C3", "Cz", "C4"],
        "samples": samples,
        "events": [
            {"sample_index": 256, "code": 1, "label": "tone"},
            {"sample_index": 640, "code": 1, "label": "tone"}
        ]
    });
    let path = dir.join(name);
    std::fs::write(&path, recording.to_string()).unwrap();
    path
}

fn write_config(dir: &Path) -> PathBuf {
    let path = dir.join("pipeline.json");
    std::fs::write(
        &path,
        r#"{
            "reference": "average",
            "filter": {"method": "iir", "low_freq": 1, "high_freq": 30},
            "epoch": {"event_codes": [1], "time_lim": [-0.2, 0.5], "baseline": [-0.2, 0.0]},
            "artifacts": {}
        }"#,
    )
    .unwrap();
    path
}

// =============================================================================
// RUN
// =============================================================================

#[test]
fn test_run_to_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    let recording = write_recording(tmp.path(), "rec.json");
    let config = write_config(tmp.path());

    let output = eegprep()
        .arg("run")
        .arg("--recording")
        .arg(&recording)
        .arg("--config")
        .arg(&config)
        .arg("--compact")
        .arg("--quiet")
        .assert()
        .success();

    let stdout = String::from_utf8(output.get_output().stdout.clone()).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["epoch_report"]["matched"], 2);
    assert_eq!(parsed["epochs"]["epoch_meta"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["epochs"]["epoch_meta"][0]["event_label"], "1");
    assert!(parsed["artifact_report"].is_object());
}

#[test]
fn test_run_to_file() {
    let tmp = tempfile::tempdir().unwrap();
    let recording = write_recording(tmp.path(), "rec.json");
    let config = write_config(tmp.path());
    let out = tmp.path().join("epochs.json");

    eegprep()
        .arg("run")
        .arg("--recording")
        .arg(&recording)
        .arg("--config")
        .arg(&config)
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("Results written to"));

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(parsed["epochs"]["channel_labels"], serde_json::json!(["C3", "Cz", "C4"]));
}

#[test]
fn test_run_unmatched_codes_is_execution_error() {
    let tmp = tempfile::tempdir().unwrap();
    let recording = write_recording(tmp.path(), "rec.json");
    let config = tmp.path().join("codes.json");
    std::fs::write(&config, r#"{"epoch": {"event_codes": [42]}}"#).unwrap();

    eegprep()
        .arg("run")
        .arg("--recording")
        .arg(&recording)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No events match"));
}

// =============================================================================
// BATCH
// =============================================================================

#[test]
fn test_batch_writes_one_file_per_recording() {
    let tmp = tempfile::tempdir().unwrap();
    write_recording(tmp.path(), "sub-01.json");
    write_recording(tmp.path(), "sub-02.json");
    let config = write_config(tmp.path());
    let out_dir = tmp.path().join("out");

    eegprep()
        .arg("batch")
        .arg("--glob")
        .arg(format!("{}/sub-*.json", tmp.path().display()))
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(&out_dir)
        .assert()
        .success()
        .stderr(predicate::str::contains("2/2 succeeded"));

    assert!(out_dir.join("sub-01_epochs.json").is_file());
    assert!(out_dir.join("sub-02_epochs.json").is_file());
}

#[test]
fn test_batch_partial_failure() {
    let tmp = tempfile::tempdir().unwrap();
    let good = write_recording(tmp.path(), "good.json");
    let bad = tmp.path().join("bad.json");
    std::fs::write(&bad, "not json").unwrap();
    let config = write_config(tmp.path());

    eegprep()
        .arg("batch")
        .arg("--files")
        .arg(&good)
        .arg(&bad)
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(tmp.path().join("out"))
        .arg("--continue-on-error")
        .assert()
        .code(3);
}

#[test]
fn test_batch_dry_run_lists_files() {
    let tmp = tempfile::tempdir().unwrap();
    write_recording(tmp.path(), "a.json");
    write_recording(tmp.path(), "b.json");
    let out_dir = tmp.path().join("out");

    eegprep()
        .arg("batch")
        .arg("--glob")
        .arg(format!("{}/*.json", tmp.path().display()))
        .arg("--config")
        .arg("unused.json")
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("a.json"))
        .stdout(predicate::str::contains("b.json"));

    assert!(!out_dir.exists());
}
