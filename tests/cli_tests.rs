//! CLI tests for the `rest-timer` binary.
//!
//! These run the compiled binary end to end:
//! - Help and completions output
//! - Configuration loading and errors
//! - Short foreground countdowns

use assert_cmd::Command;
use predicates::prelude::*;

fn rest_timer() -> Command {
    let mut cmd = Command::cargo_bin("rest-timer").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &tempfile::TempDir, json: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.json");
    std::fs::write(&path, json).unwrap();
    path
}

// ============================================================================
// Help and Completions
// ============================================================================

#[test]
fn test_help_lists_commands() {
    rest_timer()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("completions"));
}

#[test]
fn test_completions_bash() {
    rest_timer()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rest-timer"));
}

#[test]
fn test_unknown_command_fails() {
    rest_timer().arg("status").assert().failure();
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn test_config_prints_file_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{"default_rest_seconds": 150, "alarm_title": "次のセット"}"#);

    rest_timer()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"default_rest_seconds\": 150"))
        .stdout(predicate::str::contains("次のセット"))
        .stdout(predicate::str::contains("exercise.rest.complete"));
}

#[test]
fn test_config_rejects_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{"tick_interval_ms": 5}"#);

    rest_timer()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("エラー"))
        .stderr(predicate::str::contains("tick_interval_ms"));
}

#[test]
fn test_config_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();

    rest_timer()
        .arg("config")
        .arg("--config")
        .arg(dir.path().join("nope.json"))
        .assert()
        .failure();
}

// ============================================================================
// Start
// ============================================================================

#[test]
fn test_start_zero_is_a_notice() {
    rest_timer()
        .args(["start", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1秒以上"));
}

#[test]
fn test_start_negative_is_a_notice() {
    rest_timer()
        .args(["start", "-30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-30"));
}

#[test]
fn test_start_too_large_is_a_notice() {
    rest_timer()
        .args(["start", "9223372036854775807"])
        .assert()
        .success()
        .stdout(predicate::str::contains("大きすぎます"))
        .stdout(predicate::str::contains("1秒以上").not());
}

#[test]
fn test_start_runs_to_completion_with_notification() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{"tick_interval_ms": 100}"#);

    rest_timer()
        .args(["start", "1", "--no-alarm", "--config"])
        .arg(&path)
        .timeout(std::time::Duration::from_secs(15))
        .assert()
        .success()
        .stdout(predicate::str::contains("休憩を開始しました"))
        .stdout(predicate::str::contains("休憩が終了しました"))
        .stdout(predicate::str::contains("[通知] 休憩終了"));
}

#[test]
fn test_start_cancel_from_stdin() {
    rest_timer()
        .args(["start", "300"])
        .write_stdin("c\n")
        .timeout(std::time::Duration::from_secs(15))
        .assert()
        .success()
        .stdout(predicate::str::contains("休憩をキャンセルしました"));
}

#[test]
fn test_start_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, r#"{"tick_interval_ms": 100}"#);

    rest_timer()
        .args(["start", "1", "--json", "--no-alarm", "--config"])
        .arg(&path)
        .timeout(std::time::Duration::from_secs(15))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"isResting\":true"))
        .stdout(predicate::str::contains("\"totalSeconds\":1"));
}
