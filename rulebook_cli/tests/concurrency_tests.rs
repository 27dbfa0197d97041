//! Concurrency tests for the rulebook binary.
//!
//! These tests verify that multiple processes can safely:
//! - Create rules in the same store simultaneously (file locking)
//! - Read the store while another process writes it

use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::thread;
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

fn week_args(week: u32) -> Vec<String> {
    ["--program", "p1", "--schedule", "s1", "--week"]
        .iter()
        .map(|s| s.to_string())
        .chain(std::iter::once(week.to_string()))
        .collect()
}

/// Seed week 1 with a straight set and a three-exercise circuit
fn seed(data_dir: &Path) {
    let mut rules = vec![serde_json::json!({
        "id": "s1-straight", "program_id": "p1", "program_schedule_id": "s1",
        "week_number": 1, "block_order": 1, "block_type": "straight_set",
        "exercise_order": 1, "exercise_id": "back_squat", "sets": 5, "reps": "5"
    })];
    for (index, exercise) in ["burpee", "box_jump", "push_up"].iter().enumerate() {
        rules.push(serde_json::json!({
            "id": format!("c{}", index + 1), "program_id": "p1", "program_schedule_id": "s1",
            "week_number": 1, "block_order": 2, "block_type": "circuit",
            "exercise_order": index + 1, "exercise_id": exercise, "reps": "10", "rounds": 3
        }));
    }
    let path = data_dir.join("seed.json");
    std::fs::write(&path, serde_json::to_string(&rules).unwrap()).unwrap();
    cli(data_dir).arg("import").arg(&path).assert().success();
}

fn rule_count(data_dir: &Path) -> usize {
    let contents = std::fs::read_to_string(data_dir.join("rules.json")).unwrap();
    let document: Value = serde_json::from_str(&contents).unwrap();
    document["rules"].as_array().unwrap().len()
}

#[test]
fn test_concurrent_placeholder_saves() {
    let temp_dir = setup_test_dir();
    let data_dir: PathBuf = temp_dir.path().to_path_buf();
    seed(&data_dir);

    // Each process materializes a different borrowed week (4 rows each)
    let handles: Vec<_> = (2..=5)
        .map(|week| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli(&data_dir)
                    .arg("set")
                    .args(week_args(week))
                    .args(["--block", "1", "--field", "reps", "--value", "6"])
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(rule_count(&data_dir), 4 + 4 * 4);
}

#[test]
fn test_concurrent_reads_and_writes() {
    let temp_dir = setup_test_dir();
    let data_dir: PathBuf = temp_dir.path().to_path_buf();
    seed(&data_dir);

    let writer = {
        let data_dir = data_dir.clone();
        thread::spawn(move || {
            for value in ["6", "7", "8"] {
                cli(&data_dir)
                    .arg("set")
                    .args(week_args(1))
                    .args(["--block", "2", "--field", "rounds", "--value", value])
                    .assert()
                    .success();
            }
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli(&data_dir)
                    .arg("show")
                    .args(week_args(1))
                    .arg("--json")
                    .assert()
                    .success();
            })
        })
        .collect();

    writer.join().expect("Writer panicked");
    for reader in readers {
        reader.join().expect("Reader panicked");
    }

    let contents = std::fs::read_to_string(data_dir.join("rules.json")).unwrap();
    let document: Value = serde_json::from_str(&contents).unwrap();
    let rules = document["rules"].as_array().unwrap();
    assert_eq!(rules.len(), 4);
    assert!(rules
        .iter()
        .filter(|r| r["block_type"] == "circuit")
        .all(|r| r["rounds"] == 8));
}
