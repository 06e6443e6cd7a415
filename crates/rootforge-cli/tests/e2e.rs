//! End-to-end tests for the rootforge CLI.
//!
//! Only paths that never reach an external tool are exercised here:
//! argument handling, validation, configuration and `--plan`.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn rootforge() -> Command {
    let mut cmd = Command::cargo_bin("rootforge").expect("Failed to find rootforge binary");
    for key in ["ROOTFORGE_JOBS", "ROOTFORGE_WORK_DIR", "ROOTFORGE_SOURCE_URL", "ROOTFORGE_SUDO"] {
        cmd.env_remove(key);
    }
    cmd
}

fn plan_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("plan output should be JSON")
}

// =============================================================================
// Arguments and validation
// =============================================================================

#[test]
fn test_missing_arguments() {
    rootforge()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));

    rootforge()
        .arg("3.11")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_too_many_arguments() {
    rootforge()
        .args(["3.11", "6.32.04", "extra"])
        .assert()
        .code(1);
}

#[test]
fn test_malformed_target_version() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("work");

    rootforge()
        .args(["3.11", "6.32", "--work-dir"])
        .arg(&work)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("target version '6.32'"))
        .stderr(predicate::str::contains("hint"));

    assert!(!work.exists(), "validation must happen before any side effect");
}

#[test]
fn test_malformed_runtime_version() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("work");

    rootforge()
        .args(["python3", "6.32.04", "--work-dir"])
        .arg(&work)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("runtime version 'python3'"));

    assert!(!work.exists());
}

#[test]
fn test_help() {
    rootforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("RUNTIME_VERSION"))
        .stdout(predicate::str::contains("--plan"));
}

// =============================================================================
// Plans
// =============================================================================

#[test]
fn test_plan_artifact_name() {
    let temp = TempDir::new().unwrap();
    let work = temp.path().join("work");

    let output = rootforge()
        .args(["3.11", "6.32.04", "--plan", "--jobs", "2", "--work-dir"])
        .arg(&work)
        .output()
        .expect("Failed to execute command");

    assert!(
        output.status.success(),
        "plan should succeed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let plan = plan_json(&output.stdout);
    let artifact = plan["artifact"].as_str().unwrap();
    assert!(artifact.ends_with("artifacts/root_v6.32.04_Ubuntu_Python3.11.zip"));
    assert_eq!(plan["jobs"], 2);
    assert_eq!(
        plan["source_url"],
        "https://root.cern/download/root_v6.32.04.source.tar.gz"
    );
    assert_eq!(plan["stages"].as_array().unwrap().len(), 8);
    assert!(plan["options"]
        .as_array()
        .unwrap()
        .iter()
        .any(|o| o["key"] == "davix" && o["setting"] == "ON"));

    assert!(!work.exists(), "--plan must not touch the host");
}

#[test]
fn test_plan_format_flag() {
    let temp = TempDir::new().unwrap();

    rootforge()
        .args(["3.12", "6.30.06", "--plan", "--format", "tar.gz", "--work-dir"])
        .arg(temp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("root_v6.30.06_Ubuntu_Python3.12.tar.gz"));

    rootforge()
        .args(["3.12", "6.30.06", "--plan", "--format", "rar"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown archive format"));
}

#[test]
fn test_zero_jobs_rejected() {
    rootforge()
        .args(["3.11", "6.32.04", "--plan", "--jobs", "0"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("jobs must be at least 1"));
}

#[test]
fn test_config_precedence() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("rootforge.json");
    fs::write(
        &config,
        r#"{ "jobs": 5, "artifact": { "platform": "Debian", "format": "tar.xz" } }"#,
    )
    .unwrap();

    // File only
    let output = rootforge()
        .args(["3.11", "6.32.04", "--plan", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    let plan = plan_json(&output.stdout);
    assert_eq!(plan["jobs"], 5);
    assert!(plan["artifact"]
        .as_str()
        .unwrap()
        .ends_with("root_v6.32.04_Debian_Python3.11.tar.xz"));

    // Environment beats the file
    let output = rootforge()
        .env("ROOTFORGE_JOBS", "7")
        .args(["3.11", "6.32.04", "--plan", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(plan_json(&output.stdout)["jobs"], 7);

    // Flags beat the environment
    let output = rootforge()
        .env("ROOTFORGE_JOBS", "7")
        .args(["3.11", "6.32.04", "--plan", "-j", "3", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    assert_eq!(plan_json(&output.stdout)["jobs"], 3);
}

#[test]
fn test_flag_repairs_invalid_environment() {
    let output = rootforge()
        .env("ROOTFORGE_JOBS", "0")
        .args(["3.11", "6.32.04", "--plan", "-j", "4"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "flags should win over the environment. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(plan_json(&output.stdout)["jobs"], 4);

    rootforge()
        .env("ROOTFORGE_JOBS", "0")
        .args(["3.11", "6.32.04", "--plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("jobs must be at least 1"));
}

#[test]
fn test_unrecognised_sudo_switch() {
    rootforge()
        .env("ROOTFORGE_SUDO", "y")
        .args(["3.11", "6.32.04", "--plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ROOTFORGE_SUDO"));
}

#[test]
fn test_broken_config_file() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("rootforge.json");
    fs::write(&config, "{ not json").unwrap();

    rootforge()
        .args(["3.11", "6.32.04", "--plan", "--config"])
        .arg(&config)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("failed to parse config"));
}
