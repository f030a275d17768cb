//! Tests for the nasabin binary

use assert_cmd::Command;
use polars::prelude::*;
use predicates::prelude::*;

mod common;

use common::{create_temp_csv, credit_frame};

fn nasabin() -> Command {
    Command::cargo_bin("nasabin").unwrap()
}

#[test]
fn test_help_lists_binning_flags() {
    nasabin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--min-event-rate-diff"))
        .stdout(predicate::str::contains("--time-col"))
        .stdout(predicate::str::contains("--monotonic"));
}

#[test]
fn test_fit_prints_summary() {
    let mut df = credit_frame(1500, 4);
    let (_dir, path) = create_temp_csv(&mut df);

    nasabin()
        .args(["-i", path.to_str().unwrap(), "-t", "default", "--quiet"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BINNING SUMMARY"))
        .stdout(predicate::str::contains("Total IV"))
        .stdout(predicate::str::contains("score"));
}

#[test]
fn test_time_column_prints_pivot() {
    let mut df = credit_frame(1500, 6);
    let (_dir, path) = create_temp_csv(&mut df);

    nasabin()
        .args([
            "-i",
            path.to_str().unwrap(),
            "-t",
            "default",
            "--time-col",
            "month",
            "--check-stability",
            "--quiet",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("EVENT RATE BY PERIOD"))
        .stdout(predicate::str::contains("202304"));
}

#[test]
fn test_writes_transformed_dataset() {
    let mut df = credit_frame(800, 8);
    let (dir, path) = create_temp_csv(&mut df);
    let output = dir.path().join("binned.parquet");

    nasabin()
        .args([
            "-i",
            path.to_str().unwrap(),
            "-t",
            "default",
            "-o",
            output.to_str().unwrap(),
            "--transform",
            "labels",
            "--quiet",
        ])
        .assert()
        .success();

    let file = std::fs::File::open(&output).unwrap();
    let binned = ParquetReader::new(file).finish().unwrap();
    assert_eq!(binned.height(), 800);
    assert_eq!(binned.column("score").unwrap().dtype(), &DataType::String);
}

#[test]
fn test_unknown_strategy_fails() {
    nasabin()
        .args(["-i", "data.csv", "-t", "y", "--strategy", "random"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown strategy"));
}

#[test]
fn test_invalid_trend_fails() {
    let mut df = credit_frame(100, 1);
    let (_dir, path) = create_temp_csv(&mut df);

    nasabin()
        .args(["-i", path.to_str().unwrap(), "-t", "default", "--monotonic", "peak"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid binning configuration"));
}

#[test]
fn test_missing_target_fails() {
    let mut df = credit_frame(100, 1);
    let (_dir, path) = create_temp_csv(&mut df);

    nasabin()
        .args(["-i", path.to_str().unwrap(), "-t", "bad_target", "--quiet"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("bad_target"));
}
