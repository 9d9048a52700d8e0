//! Integration tests for the `hearth request` and `hearth status` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG: &str = r#"
fast_tier_capacity_bytes = 4096
slow_tier_capacity_bytes = 4096

[[models]]
id = "scout-7b"
aliases = ["scout"]
size_bytes = 2000
affinity = "fast_only"
priority = "preferred"

[[models]]
id = "keeper-1b"
size_bytes = 500
affinity = "fast_only"
priority = "pinned"

[[routes]]
capability = "research"
models = ["scout-7b"]
"#;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_request_served_by_primary() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    cmd.arg("request")
        .arg(file.path())
        .arg("--capability")
        .arg("research")
        .arg("--prompt")
        .arg("hello")
        .assert()
        .success()
        .stdout(predicate::str::contains("Served by"))
        .stdout(predicate::str::contains("scout-7b"));
}

#[test]
fn test_request_json_output() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    let assert = cmd
        .arg("request")
        .arg(file.path())
        .arg("--capability")
        .arg("research")
        .arg("--prompt")
        .arg("hello")
        .arg("--json")
        .assert()
        .success();

    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["model_id"], "scout-7b");
    assert_eq!(parsed["fallback_depth"], 0);
}

#[test]
fn test_request_explicit_model_bypasses_routes() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    // keeper-1b is not routed under any capability.
    cmd.arg("request")
        .arg(file.path())
        .arg("--model")
        .arg("keeper-1b")
        .arg("--prompt")
        .arg("hello")
        .assert()
        .success()
        .stdout(predicate::str::contains("keeper-1b"));
}

#[test]
fn test_request_rejects_capability_and_model_together() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    cmd.arg("request")
        .arg(file.path())
        .arg("--capability")
        .arg("research")
        .arg("--model")
        .arg("scout-7b")
        .arg("--prompt")
        .arg("hello")
        .assert()
        .failure();
}

#[test]
fn test_request_unknown_capability_fails() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    cmd.arg("request")
        .arg(file.path())
        .arg("--capability")
        .arg("translation")
        .arg("--prompt")
        .arg("hello")
        .assert()
        .failure();
}

#[test]
fn test_status_warms_pinned_models() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    cmd.arg("status")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Hearth Status"))
        .stdout(predicate::str::contains("keeper-1b"));
}

#[test]
fn test_preload_reports_residency() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    cmd.arg("preload")
        .arg(file.path())
        .arg("scout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded"))
        .stdout(predicate::str::contains("scout-7b"));
}

#[test]
fn test_preload_rejects_unknown_tier() {
    let file = config_file(CONFIG);
    let mut cmd = Command::cargo_bin("hearth").unwrap();

    cmd.arg("preload")
        .arg(file.path())
        .arg("scout")
        .arg("--tier")
        .arg("medium")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown tier"));
}
