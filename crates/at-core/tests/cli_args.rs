//! CLI argument and input validation tests.
//!
//! Input errors must be rejected before any file is written or any request
//! is made, with exit code 10.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::time::Duration;
use tempfile::tempdir;

fn autotune_dow() -> Command {
    let mut cmd = cargo_bin_cmd!("autotune-dow");
    cmd.timeout(Duration::from_secs(30));
    cmd.env_remove("NIGHTSCOUT_HOST");
    cmd.env_remove("NIGHTSCOUT_TOKEN");
    cmd
}

#[test]
fn help_lists_flags() {
    autotune_dow()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--days-of-week"))
        .stdout(predicate::str::contains("NIGHTSCOUT_HOST"));
}

#[test]
fn weekday_zero_is_rejected() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .arg("-d")
        .arg(dir.path())
        .args(["-n", "http://127.0.0.1:9"])
        .args(["-s", "2023-01-02", "-e", "2023-01-16"])
        .args(["-w", "0,1"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("invalid weekday selector"));
    assert!(!dir.path().join("autotune").exists());
}

#[test]
fn reversed_range_is_rejected() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .arg("-d")
        .arg(dir.path())
        .args(["-n", "http://127.0.0.1:9"])
        .args(["-s", "2023-01-16", "-e", "2023-01-02"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("invalid date range"));
    assert!(!dir.path().join("autotune").exists());
}

#[test]
fn empty_range_is_rejected() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .arg("-d")
        .arg(dir.path())
        .args(["-n", "http://127.0.0.1:9"])
        .args(["-s", "2023-01-02", "-e", "2023-01-02"])
        .assert()
        .code(10);
}

#[test]
fn missing_host_is_config_error() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .arg("-d")
        .arg(dir.path())
        .args(["-s", "2023-01-02", "-e", "2023-01-16"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("ns_host"));
}

#[test]
fn host_from_environment_is_accepted_for_validation() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .env("NIGHTSCOUT_HOST", "ftp://ns.example.org")
        .arg("-d")
        .arg(dir.path())
        .args(["-s", "2023-01-02", "-e", "2023-01-16"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("ftp://ns.example.org"));
}

#[test]
fn zero_runs_is_rejected() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .arg("-d")
        .arg(dir.path())
        .args(["-n", "http://127.0.0.1:9"])
        .args(["-s", "2023-01-02", "-e", "2023-01-16"])
        .args(["-r", "0"])
        .assert()
        .code(10);
}

#[test]
fn missing_explicit_config_file_is_rejected() {
    let dir = tempdir().unwrap();
    autotune_dow()
        .arg("-d")
        .arg(dir.path())
        .args(["-n", "http://127.0.0.1:9"])
        .args(["-s", "2023-01-02"])
        .arg("--config")
        .arg(dir.path().join("nope.toml"))
        .assert()
        .code(10);
}

#[test]
fn missing_start_date_is_usage_error() {
    autotune_dow()
        .args(["-d", "/tmp", "-n", "http://127.0.0.1:9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--start-date"));
}
