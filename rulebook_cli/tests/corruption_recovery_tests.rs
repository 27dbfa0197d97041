//! Corruption recovery tests for the rulebook binary.
//!
//! These tests verify the system can handle:
//! - A corrupted rule store (refused, never overwritten)
//! - Malformed template and exercise overrides (ignored)
//! - Malformed imports (rejected without touching the store)
//! - Missing data directories

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rulebook"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

const WEEK_ONE: [&str; 6] = ["--program", "p1", "--schedule", "s1", "--week", "1"];

#[test]
fn test_corrupted_store_is_refused() {
    let temp_dir = setup_test_dir();
    let store_path = temp_dir.path().join("rules.json");
    fs::write(&store_path, "{ invalid json }}}}").unwrap();

    cli(temp_dir.path())
        .arg("show")
        .args(WEEK_ONE)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Corrupt rule store"));

    cli(temp_dir.path())
        .args(["schedule", "s1", "--program", "p1"])
        .assert()
        .failure();

    assert_eq!(fs::read_to_string(&store_path).unwrap(), "{ invalid json }}}}");
}

#[test]
fn test_malformed_templates_fall_back_to_builtins() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("templates.json"), "[{ broken").unwrap();

    cli(temp_dir.path())
        .arg("templates")
        .assert()
        .success()
        .stdout(predicate::str::contains("lower_strength"));
}

#[test]
fn test_malformed_exercises_fall_back_to_builtins() {
    let temp_dir = setup_test_dir();
    fs::write(temp_dir.path().join("exercises.json"), "not json").unwrap();

    cli(temp_dir.path())
        .args(["schedule", "s1", "--program", "p1", "--template", "upper_strength"])
        .assert()
        .success();

    cli(temp_dir.path())
        .arg("show")
        .args(WEEK_ONE)
        .assert()
        .success()
        .stdout(predicate::str::contains("bench_press (Barbell Bench Press)"));
}

#[test]
fn test_malformed_import_leaves_store_untouched() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["schedule", "s1", "--program", "p1"])
        .assert()
        .success();
    let before = fs::read_to_string(data_dir.join("rules.json")).unwrap();

    let bad = data_dir.join("bad.json");
    fs::write(&bad, r#"[{"id": "x", "block_type": "hexagon_set"}]"#).unwrap();

    cli(data_dir)
        .arg("import")
        .arg(&bad)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Json"));

    assert_eq!(fs::read_to_string(data_dir.join("rules.json")).unwrap(), before);
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("nested/data");

    cli(&data_dir)
        .arg("show")
        .args(WEEK_ONE)
        .assert()
        .success()
        .stdout(predicate::str::contains("No blocks."));

    assert!(data_dir.exists());
}

#[test]
fn test_unknown_template_replace_keeps_week() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["schedule", "s1", "--program", "p1", "--template", "conditioning"])
        .assert()
        .success();
    cli(data_dir).arg("show").args(WEEK_ONE).assert().success();

    cli(data_dir)
        .arg("replace")
        .args(WEEK_ONE)
        .args(["--template", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NotFound"));

    cli(data_dir)
        .arg("show")
        .args(WEEK_ONE)
        .assert()
        .success()
        .stdout(predicate::str::contains("Block 3: Finisher (circuit)"));
}
