//! CLI integration tests

use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn tdp(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_tdp"));
    command
        .env("HOME", home)
        .env("NO_COLOR", "1")
        .env_remove("TDP_API_URL")
        .env_remove("TDP_ARTIFACTS_DIR")
        .env_remove("RUST_LOG");
    command
}

fn run(command: &mut Command) -> Output {
    command.output().expect("Failed to execute tdp")
}

/// Write a sample dataset and train a quick bundle from it
fn trained_bundle(dir: &TempDir) -> std::path::PathBuf {
    let data = dir.path().join("history.csv");
    let bundle = dir.path().join("bundle");

    let output = run(tdp(dir.path()).args([
        "sample-data",
        "--rows",
        "150",
        "--seed",
        "7",
        "--output",
        data.to_str().unwrap(),
    ]));
    assert!(output.status.success(), "sample-data should succeed");

    let output = run(tdp(dir.path()).args([
        "--format",
        "json",
        "train",
        "--data",
        data.to_str().unwrap(),
        "--output",
        bundle.to_str().unwrap(),
        "--quick",
    ]));
    assert!(
        output.status.success(),
        "train should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let manifest: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["tree_count"], 50);
    assert_eq!(manifest["seed"], 42);

    bundle
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = run(tdp(home.path()).arg("--help"));

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("Training Duration Estimator"),
        "Should show app name"
    );
    for command in ["train", "sample-data", "inspect", "predict", "health"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = run(tdp(home.path()).arg("--version"));

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("tdp"), "Should show binary name");
}

/// Test predict subcommand help lists the feature flags
#[test]
fn test_predict_help() {
    let home = TempDir::new().unwrap();
    let output = run(tdp(home.path()).args(["predict", "--help"]));

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Predict help should succeed");
    for flag in [
        "--artifacts",
        "--input",
        "--age",
        "--education",
        "--experience",
        "--study-hours",
        "--grade",
        "--difficulty",
        "--planned-weeks",
    ] {
        assert!(stdout.contains(flag), "Should show {} option", flag);
    }
}

/// Test that sample data is reproducible for a seed
#[test]
fn test_sample_data_is_reproducible() {
    let home = TempDir::new().unwrap();
    let first = run(tdp(home.path()).args(["sample-data", "--rows", "20", "--seed", "3"]));
    let second = run(tdp(home.path()).args(["sample-data", "--rows", "20", "--seed", "3"]));

    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let csv = String::from_utf8_lossy(&first.stdout);
    let mut lines = csv.lines();
    let header = lines.next().unwrap();
    assert!(header.starts_with("Âge,Niveau_Éducation"));
    assert!(header.ends_with("Durée_Formation_Réelle"));
    assert_eq!(lines.count(), 20);
}

/// Train, inspect and predict against the same bundle
#[test]
fn test_train_inspect_predict_locally() {
    let dir = TempDir::new().unwrap();
    let bundle = trained_bundle(&dir);

    let output = run(tdp(dir.path()).args([
        "--format",
        "json",
        "inspect",
        "--artifacts",
        bundle.to_str().unwrap(),
    ]));
    assert!(output.status.success(), "inspect should succeed");
    let inspected: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(inspected["features"].as_array().unwrap().len(), 7);
    assert!(inspected["manifest"]["report"]["evaluation"]["rmse"].is_number());
    let depth = inspected["max_depth"].as_u64().unwrap();
    assert!((1..=10).contains(&depth), "depth {}", depth);
    assert!(inspected["leaves"].as_u64().unwrap() >= 50);

    let output = run(tdp(dir.path()).args([
        "--format",
        "json",
        "predict",
        "--artifacts",
        bundle.to_str().unwrap(),
        "--age",
        "30",
        "--education",
        "Bac+3",
        "--experience",
        "2",
        "--study-hours",
        "20",
        "--grade",
        "14.5",
        "--difficulty",
        "Moyen",
        "--planned-weeks",
        "52",
    ]));
    assert!(
        output.status.success(),
        "predict should succeed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let envelope: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["success"], true);
    let weeks = envelope["prediction"]["duree_semaines"].as_f64().unwrap();
    assert!((1.0..=156.0).contains(&weeks));
    assert_eq!(envelope["prediction"]["intervalle_confiance"]["niveau_confiance"], 95);
}

/// A rejected request prints the failure envelope and exits non-zero
#[test]
fn test_local_predict_rejection() {
    let dir = TempDir::new().unwrap();
    let bundle = trained_bundle(&dir);

    let output = run(tdp(dir.path()).args([
        "--format",
        "json",
        "predict",
        "--artifacts",
        bundle.to_str().unwrap(),
        "--age",
        "15",
        "--education",
        "Bac+3",
        "--experience",
        "2",
        "--study-hours",
        "20",
        "--grade",
        "14.5",
        "--difficulty",
        "Moyen",
        "--planned-weeks",
        "52",
    ]));

    assert!(!output.status.success());
    let envelope: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(envelope["success"], false);
    assert_eq!(envelope["error"], "L'âge doit être compris entre 16 et 100 ans");
    assert_eq!(envelope["message"], "Erreur lors de la prédiction");
}

/// Training refuses to overwrite an existing bundle without --force
#[test]
fn test_train_refuses_existing_output() {
    let dir = TempDir::new().unwrap();
    let bundle = trained_bundle(&dir);
    let data = dir.path().join("history.csv");

    let output = run(tdp(dir.path()).args([
        "train",
        "--data",
        data.to_str().unwrap(),
        "--output",
        bundle.to_str().unwrap(),
        "--quick",
    ]));
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--force"));

    let output = run(tdp(dir.path()).args([
        "train",
        "--data",
        data.to_str().unwrap(),
        "--output",
        bundle.to_str().unwrap(),
        "--quick",
        "--force",
    ]));
    assert!(output.status.success(), "train --force should succeed");
}

/// Inspecting a missing bundle fails cleanly
#[test]
fn test_inspect_missing_bundle() {
    let dir = TempDir::new().unwrap();
    let output = run(tdp(dir.path()).args([
        "inspect",
        "--artifacts",
        dir.path().join("absent").to_str().unwrap(),
    ]));

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load bundle"));
}
