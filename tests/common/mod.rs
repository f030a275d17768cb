//! Shared test utilities and fixture generators

#![allow(dead_code)]

use nasabin::pipeline::{BinRow, BinTable, Period};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tempfile::TempDir;

/// Bin table of feature `x` with 1000 rows per bin and the given event rates
pub fn table_from_rates(rates: &[f64]) -> BinTable {
    let rows = rates
        .iter()
        .enumerate()
        .map(|(code, rate)| {
            let event = (rate * 1000.0).round() as u64;
            BinRow::new("x", format!("b{}", code), code, event, 1000 - event, None)
        })
        .collect();
    BinTable::new(rows)
}

/// Same as [`table_from_rates`] with one row per period; `rates[bin][period]`
pub fn table_from_period_rates(rates: &[Vec<f64>], periods: &[i64]) -> BinTable {
    let mut rows = Vec::new();
    for (code, bin_rates) in rates.iter().enumerate() {
        for (rate, period) in bin_rates.iter().zip(periods) {
            let event = (rate * 1000.0).round() as u64;
            rows.push(BinRow::new(
                "x",
                format!("b{}", code),
                code,
                event,
                1000 - event,
                Some(Period::Int(*period)),
            ));
        }
    }
    BinTable::new(rows)
}

/// Event rates of the six-bin refinement scenario
pub const SIX_BIN_RATES: [f64; 6] = [0.05, 0.06, 0.20, 0.55, 0.58, 0.90];

/// Feature `x` in {0, 1} equal to the target, 100 rows per value and period
/// over three periods
pub fn perfect_separator() -> (Vec<Option<f64>>, Vec<u8>, Vec<Period>) {
    let mut values = Vec::new();
    let mut target = Vec::new();
    let mut periods = Vec::new();
    for period in [202301i64, 202302, 202303] {
        for i in 0..200 {
            let y = u8::from(i % 2 == 0);
            values.push(Some(f64::from(y)));
            target.push(y);
            periods.push(Period::Int(period));
        }
    }
    (values, target, periods)
}

/// Synthetic credit dataset.
///
/// - `score`: numeric, event probability falls as the score rises
/// - `grade`: categorical A..E, event probability rises with the letter
/// - `noise`: numeric, independent of the target
/// - `flag`: boolean, ignored by the binner
/// - `month`: period column 202301..202304
/// - `default`: binary target
pub fn credit_frame(rows: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let grades = ["A", "B", "C", "D", "E"];

    let mut score = Vec::with_capacity(rows);
    let mut grade = Vec::with_capacity(rows);
    let mut noise = Vec::with_capacity(rows);
    let mut flag = Vec::with_capacity(rows);
    let mut month = Vec::with_capacity(rows);
    let mut target = Vec::with_capacity(rows);

    for i in 0..rows {
        let s: f64 = rng.gen_range(300.0..850.0);
        let g = rng.gen_range(0..grades.len());
        let p = 0.05 + 0.5 * (850.0 - s) / 550.0 * 0.6 + 0.06 * g as f64;
        let y = i32::from(rng.gen::<f64>() < p);

        score.push(s);
        grade.push(grades[g]);
        noise.push(rng.gen_range(0.0..1.0));
        flag.push(rng.gen_bool(0.5));
        month.push(202301 + (i % 4) as i64);
        target.push(y);
    }

    df! {
        "score" => score,
        "grade" => grade,
        "noise" => noise,
        "flag" => flag,
        "month" => month,
        "default" => target,
    }
    .unwrap()
}

/// Create a temporary directory with a test CSV file
pub fn create_temp_csv(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let csv_path = temp_dir.path().join("test_data.csv");

    let mut file = std::fs::File::create(&csv_path).unwrap();
    CsvWriter::new(&mut file).finish(df).unwrap();

    (temp_dir, csv_path)
}

/// Create a temporary directory with a test Parquet file
pub fn create_temp_parquet(df: &mut DataFrame) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let parquet_path = temp_dir.path().join("test_data.parquet");

    let file = std::fs::File::create(&parquet_path).unwrap();
    ParquetWriter::new(file).finish(df).unwrap();

    (temp_dir, parquet_path)
}

/// Assert that a DataFrame has expected shape
pub fn assert_shape(df: &DataFrame, expected_rows: usize, expected_cols: usize) {
    let (rows, cols) = df.shape();
    assert_eq!(rows, expected_rows, "Row count mismatch: expected {}, got {}", expected_rows, rows);
    assert_eq!(cols, expected_cols, "Column count mismatch: expected {}, got {}", expected_cols, cols);
}

/// Event rates per aggregated bin, in bin order
pub fn rates(table: &BinTable) -> Vec<f64> {
    table
        .aggregate()
        .iter()
        .map(|b| b.event_rate.unwrap_or(f64::NAN))
        .collect()
}
