//! End-to-end CLI tests for the citeforge binary.
//!
//! None of these reach the network: each one fails during startup or exits early.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated from the user's config, keys and environment.
fn citeforge(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("citeforge").unwrap();
    cmd.current_dir(home.path())
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("HOME", home.path())
        .env_remove("SERPAPI_KEY")
        .env_remove("S2_API_KEY")
        .env_remove("CITEFORGE_MAILTO")
        .env_remove("OPENREVIEW_USERNAME")
        .env_remove("OPENREVIEW_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_binary_help_displays_usage() {
    let home = TempDir::new().unwrap();
    citeforge(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build verified BibTeX libraries"))
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--no-reuse"));
}

#[test]
fn test_binary_version_displays_version() {
    let home = TempDir::new().unwrap();
    citeforge(&home)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("citeforge"));
}

#[test]
fn test_binary_invalid_flag_returns_error() {
    let home = TempDir::new().unwrap();
    citeforge(&home)
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_missing_input_suggests_flag() {
    let home = TempDir::new().unwrap();
    citeforge(&home)
        .args(["-q", "--input", "missing.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read author list"))
        .stderr(predicate::str::contains("Suggestion: pass --input"));
}

#[test]
fn test_input_without_usable_authors_fails() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("authors.csv"), "name,scholar_id,dblp\nJane Doe,,\n").unwrap();
    citeforge(&home)
        .arg("-q")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no usable authors"));
}

#[test]
fn test_unknown_config_key_fails_before_any_work() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("citeforge.toml");
    std::fs::write(&config, "[concurrency]\nauthor_threads = 4\n").unwrap();
    citeforge(&home)
        .arg("-q")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config file"))
        .stderr(predicate::str::contains("author_threads"));
}

#[test]
fn test_out_of_range_config_value_is_named() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("citeforge.toml");
    std::fs::write(&config, "[similarity]\nduplicate_threshold = 1.5\n").unwrap();
    citeforge(&home)
        .arg("-q")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("similarity.duplicate_threshold"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let home = TempDir::new().unwrap();
    citeforge(&home)
        .args(["-q", "--config", "nowhere.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_workers_out_of_range_rejected_by_parser() {
    let home = TempDir::new().unwrap();
    citeforge(&home)
        .args(["--workers", "65"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("65"));
}
