//! Integration tests for the `costguard forecast`, `verify` and `history` commands.

use assert_cmd::Command;
use chrono::{Days, Utc};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Writes a billing history ending yesterday, oldest first.
fn write_history(dir: &Path, costs: &[f64]) {
    write_history_ending(dir, costs, 1);
}

/// Writes a billing history whose last row is `days_back` days before today.
fn write_history_ending(dir: &Path, costs: &[f64], days_back: usize) {
    let today = Utc::now().date_naive();
    let rows: Vec<Value> = costs
        .iter()
        .enumerate()
        .map(|(i, cost)| {
            let date = today
                .checked_sub_days(Days::new((costs.len() - 1 - i + days_back) as u64))
                .unwrap();
            serde_json::json!({"date": date.to_string(), "cost": cost})
        })
        .collect();
    fs::write(dir.join("billing.json"), serde_json::to_string(&rows).unwrap()).unwrap();
}

/// Writes ./costguard.toml pointing at files inside `dir`.
fn write_config(dir: &Path, extra: &str) {
    let config = format!(
        "[source]\npath = {:?}\n\n[store]\npath = {:?}\n\n{}",
        dir.join("billing.json").display().to_string(),
        dir.join("predictions").display().to_string(),
        extra
    );
    fs::write(dir.join("costguard.toml"), config).unwrap();
}

fn costguard(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("costguard").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG")
        .env_remove("COSTGUARD_POLICY")
        .env_remove("COSTGUARD_THRESHOLD")
        .env_remove("COSTGUARD_CHANNEL")
        .env_remove("COSTGUARD_STORE_PATH")
        .env_remove("COSTGUARD_SOURCE_PATH");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.output().unwrap();
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn test_forecast_then_verify() {
    let temp_dir = TempDir::new().unwrap();
    // Yesterday's cost is not billed yet, so the forecast targets yesterday.
    write_history_ending(temp_dir.path(), &[10.0, 12.0, 14.0], 2);
    write_config(temp_dir.path(), "");

    let forecast = json_stdout(costguard(&temp_dir).args(["forecast", "--json"]));
    assert_eq!(forecast["status_code"], 200);
    assert_eq!(forecast["body"]["stored"], "written");
    assert!((forecast["body"]["predicted_cost"].as_f64().unwrap() - 16.0).abs() < 1e-9);
    assert!(temp_dir.path().join("predictions/predicted_cost.json").exists());

    let yesterday = Utc::now().date_naive().checked_sub_days(Days::new(1)).unwrap();
    assert_eq!(forecast["body"]["for_date"], yesterday.to_string());

    // Yesterday's 15.0 is below 16.0 * 1.3.
    write_history(temp_dir.path(), &[10.0, 12.0, 14.0, 15.0]);
    let verify = json_stdout(costguard(&temp_dir).args(["verify", "--json"]));
    assert_eq!(verify["status_code"], 200);
    assert_eq!(verify["body"]["is_anomaly"], false);
    assert_eq!(verify["body"]["alert"], "skipped");
}

#[test]
fn test_verify_without_forecast_reports_no_baseline() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[10.0]);
    write_config(temp_dir.path(), "");

    costguard(&temp_dir)
        .args(["verify", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("no_baseline"));
}

#[test]
fn test_verify_same_day_as_forecast_reports_stale_baseline() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[10.0, 12.0, 14.0]);
    write_config(temp_dir.path(), "");
    costguard(&temp_dir).arg("forecast").assert().success();

    // The forecast is for today; verify checks yesterday.
    let verify = json_stdout(costguard(&temp_dir).args(["verify", "--json"]));
    assert_eq!(verify["status_code"], 200);
    assert_eq!(verify["body"]["status"], "stale_baseline");
    assert_eq!(verify["body"]["for_date"], Utc::now().date_naive().to_string());
}

#[test]
fn test_verify_with_corrupted_forecast_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[10.0]);
    write_config(temp_dir.path(), "");
    fs::create_dir_all(temp_dir.path().join("predictions")).unwrap();
    fs::write(temp_dir.path().join("predictions/predicted_cost.json"), "{oops").unwrap();

    costguard(&temp_dir)
        .args(["verify", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("MalformedArtifactError"));
}

#[test]
fn test_verify_text_output_flags_anomaly() {
    let temp_dir = TempDir::new().unwrap();
    write_history_ending(temp_dir.path(), &[10.0, 12.0, 14.0], 2);
    write_config(temp_dir.path(), "");
    costguard(&temp_dir).arg("forecast").assert().success();

    write_history(temp_dir.path(), &[40.0]);
    costguard(&temp_dir)
        .arg("verify")
        .assert()
        .success()
        .stdout(predicate::str::contains("Anomaly detected!"));
}

#[test]
fn test_forecast_with_single_day_fails() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[10.0]);
    write_config(temp_dir.path(), "");

    costguard(&temp_dir)
        .arg("forecast")
        .assert()
        .failure()
        .stderr(predicate::str::contains("InsufficientDataError"));
}

#[test]
fn test_history_days_limits_rows() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[1.0, 2.0, 3.0, 4.0]);
    write_config(temp_dir.path(), "");

    let history = json_stdout(costguard(&temp_dir).args(["history", "--days", "2", "--json"]));
    let billing = history["body"]["billing"].as_array().unwrap();
    assert_eq!(billing.len(), 2);
    assert_eq!(billing[1]["cost"], 4.0);
}

#[test]
fn test_invalid_threshold_from_environment() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[10.0, 12.0]);
    write_config(temp_dir.path(), "");

    costguard(&temp_dir)
        .env("COSTGUARD_THRESHOLD", "0")
        .args(["verify", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("ThresholdConfigError"));
}

#[test]
fn test_explicit_config_replaces_discovery() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[5.0, 6.0]);
    write_config(temp_dir.path(), "");
    let explicit = temp_dir.path().join("other.toml");
    fs::write(&explicit, "[source]\nkind = \"http\"\n").unwrap();

    // other.toml lacks source.url, so the run fails even though
    // ./costguard.toml is valid.
    costguard(&temp_dir)
        .args(["--config", explicit.to_str().unwrap(), "history", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("source.url"));
}

#[test]
fn test_debug_log_level_traces_config_and_pipeline() {
    let temp_dir = TempDir::new().unwrap();
    write_history(temp_dir.path(), &[1.0, 2.0]);
    write_config(temp_dir.path(), "");

    costguard(&temp_dir)
        .args(["--log-level", "costguard=debug", "history"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Resolved configuration"))
        .stderr(predicate::str::contains("Pipeline constructed"));
}
