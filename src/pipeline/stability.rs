//! Temporal stability metrics
//!
//! Event rate per (bin, period), dispersion of each bin's curve over time,
//! first-vs-last period drift (PSI-like shift and a two-sample KS distance)
//! and the separability of bin curves across periods.

use std::collections::{BTreeMap, BTreeSet};

use polars::prelude::*;
use serde::Serialize;

use super::bin_table::{event_rate, period_values, BinRow, BinTable, Period};
use super::target::binary_target;
use crate::error::{BinningError, Result};

/// Lower clip applied to event rates before taking logarithms
pub const SHIFT_EPSILON: f64 = 1e-9;

/// Bins whose smallest per-period count is below this are penalized
pub const LOW_FREQUENCY_COUNT: u64 = 30;

/// Penalty applied per low-frequency or inverted bin curve
pub const SEPARABILITY_PENALTY: f64 = 0.1;

/// Row key of a pivot
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PivotKey {
    pub variable: String,
    pub code: usize,
    pub bin: String,
}

/// Event rate matrix: one row per (variable, bin), one column per period,
/// both axes sorted ascending
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EventRatePivot {
    index: Vec<PivotKey>,
    periods: Vec<Period>,
    values: Vec<Vec<Option<f64>>>,
}

impl EventRatePivot {
    pub fn index(&self) -> &[PivotKey] {
        &self.index
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    /// Row-major cells, `None` where a bin has no observation in a period
    pub fn values(&self) -> &[Vec<Option<f64>>] {
        &self.values
    }

    /// `(bins, periods)`
    pub fn shape(&self) -> (usize, usize) {
        (self.index.len(), self.periods.len())
    }

    pub fn get(&self, row: usize, column: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(column)).copied().flatten()
    }

    /// Copy of the pivot with every gap filled with `0.0`
    pub fn zero_filled(&self) -> EventRatePivot {
        EventRatePivot {
            index: self.index.clone(),
            periods: self.periods.clone(),
            values: self
                .values
                .iter()
                .map(|row| row.iter().map(|v| Some(v.unwrap_or(0.0))).collect())
                .collect(),
        }
    }

    fn column(&self, column: usize) -> Vec<Option<f64>> {
        self.values.iter().map(|row| row[column]).collect()
    }
}

/// Spread of one bin's event rate over time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinDispersion {
    pub key: PivotKey,
    /// Sample standard deviation, needs two observed periods
    pub std: Option<f64>,
    /// `max - min`, needs one observed period
    pub range: Option<f64>,
}

/// Options for [`separability_score`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeparabilityOptions {
    pub penalize_inversions: bool,
    pub penalize_low_freq: bool,
}

/// Pivot a bin table into (variable, bin) x period event rates.
///
/// Rates are recomputed from `event / count`. Fails with
/// `InvalidConfiguration` when any row has no period.
pub fn event_rate_by_time(table: &BinTable) -> Result<EventRatePivot> {
    if table.is_empty() || table.rows().iter().any(|r| r.period.is_none()) {
        return Err(BinningError::config(
            "event rate by time requires a period on every bin table row",
        ));
    }

    // (key) -> period -> (event, count)
    let mut cells: BTreeMap<PivotKey, BTreeMap<Period, (u64, u64)>> = BTreeMap::new();
    let mut periods: BTreeSet<Period> = BTreeSet::new();

    for row in table.rows() {
        let Some(period) = row.period.clone() else {
            continue;
        };
        periods.insert(period.clone());
        let key = PivotKey {
            variable: row.variable.clone(),
            code: row.code,
            bin: row.bin.clone(),
        };
        let cell = cells.entry(key).or_default().entry(period).or_insert((0, 0));
        cell.0 += row.event;
        cell.1 += row.count;
    }

    let periods: Vec<Period> = periods.into_iter().collect();
    let mut index = Vec::with_capacity(cells.len());
    let mut values = Vec::with_capacity(cells.len());

    for (key, by_period) in cells {
        let row = periods
            .iter()
            .map(|p| {
                by_period
                    .get(p)
                    .and_then(|(event, count)| event_rate(*event, *count))
            })
            .collect();
        index.push(key);
        values.push(row);
    }

    Ok(EventRatePivot {
        index,
        periods,
        values,
    })
}

/// Per-bin sample standard deviation and range over observed periods
pub fn dispersion(pivot: &EventRatePivot) -> Vec<BinDispersion> {
    pivot
        .index
        .iter()
        .zip(&pivot.values)
        .map(|(key, row)| {
            let present: Vec<f64> = row.iter().flatten().copied().collect();
            let range = if present.is_empty() {
                None
            } else {
                let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                let min = present.iter().copied().fold(f64::INFINITY, f64::min);
                Some(max - min)
            };
            let std = if present.len() < 2 {
                None
            } else {
                let n = present.len() as f64;
                let mean = present.iter().sum::<f64>() / n;
                let var = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Some(var.sqrt())
            };
            BinDispersion {
                key: key.clone(),
                std,
                range,
            }
        })
        .collect()
}

/// Shift between the first and last period's event rates:
/// `sum((last - first) * ln(last / first))` with both clipped to `1e-9`.
///
/// Bins missing in either period are skipped; fewer than two periods gives 0.
pub fn distribution_shift(pivot: &EventRatePivot) -> f64 {
    let n_periods = pivot.periods.len();
    if n_periods < 2 {
        return 0.0;
    }

    let expected = pivot.column(0);
    let actual = pivot.column(n_periods - 1);

    expected
        .iter()
        .zip(&actual)
        .filter_map(|(e, a)| match (e, a) {
            (Some(e), Some(a)) => {
                let e = e.max(SHIFT_EPSILON);
                let a = a.max(SHIFT_EPSILON);
                Some((a - e) * (a / e).ln())
            }
            _ => None,
        })
        .sum()
}

/// Two-sample Kolmogorov-Smirnov statistic between the first and last
/// period's event rates (observed cells only)
pub fn two_sample_distance(pivot: &EventRatePivot) -> f64 {
    let n_periods = pivot.periods.len();
    if n_periods < 2 {
        return 0.0;
    }

    let first: Vec<f64> = pivot.column(0).into_iter().flatten().collect();
    let last: Vec<f64> = pivot.column(n_periods - 1).into_iter().flatten().collect();
    ks_statistic(&first, &last)
}

/// Maximum absolute difference between the empirical CDFs of two samples
pub fn ks_statistic(a: &[f64], b: &[f64]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(|x, y| x.total_cmp(y));
    b.sort_by(|x, y| x.total_cmp(y));

    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut max_ks = 0.0f64;

    while i < a.len() && j < b.len() {
        let v = a[i].min(b[j]);
        while i < a.len() && a[i] <= v {
            i += 1;
        }
        while j < b.len() && b[j] <= v {
            j += 1;
        }
        let diff = (i as f64 / n_a - j as f64 / n_b).abs();
        if diff > max_ks {
            max_ks = diff;
        }
    }

    max_ks
}

/// Build a period-level bin table from row observations
pub fn observations_table(
    variable: &str,
    codes: &[usize],
    target: &[u8],
    periods: &[Period],
) -> BinTable {
    let mut cells: BTreeMap<(usize, Period), (u64, u64)> = BTreeMap::new();
    for ((code, t), period) in codes.iter().zip(target).zip(periods) {
        let cell = cells.entry((*code, period.clone())).or_insert((0, 0));
        if *t == 1 {
            cell.0 += 1;
        } else {
            cell.1 += 1;
        }
    }

    let rows = cells
        .into_iter()
        .map(|((code, period), (event, non_event))| {
            BinRow::new(variable, code.to_string(), code, event, non_event, Some(period))
        })
        .collect();
    BinTable::new(rows)
}

/// How well bin event-rate curves stay apart over time.
///
/// Mean over unordered bin pairs of the mean absolute difference between
/// their curves (periods observed in both). Fewer than two bins gives 0.
pub fn separability_score(
    codes: &[usize],
    target: &[u8],
    periods: &[Period],
    options: &SeparabilityOptions,
) -> f64 {
    let table = observations_table("", codes, target, periods);
    let Ok(pivot) = event_rate_by_time(&table) else {
        return 0.0;
    };

    let curves = pivot.values();
    let n_bins = curves.len();
    if n_bins < 2 {
        return 0.0;
    }

    let mut distances = Vec::with_capacity(n_bins * (n_bins - 1) / 2);
    for i in 0..n_bins {
        for j in (i + 1)..n_bins {
            let diffs: Vec<f64> = curves[i]
                .iter()
                .zip(&curves[j])
                .filter_map(|(a, b)| match (a, b) {
                    (Some(a), Some(b)) => Some((a - b).abs()),
                    _ => None,
                })
                .collect();
            if !diffs.is_empty() {
                distances.push(diffs.iter().sum::<f64>() / diffs.len() as f64);
            }
        }
    }

    let mut score = if distances.is_empty() {
        0.0
    } else {
        distances.iter().sum::<f64>() / distances.len() as f64
    };

    if options.penalize_low_freq {
        let mut min_count: BTreeMap<usize, u64> = BTreeMap::new();
        for row in table.rows() {
            let entry = min_count.entry(row.code).or_insert(u64::MAX);
            *entry = (*entry).min(row.count);
        }
        let low = min_count.values().filter(|c| **c < LOW_FREQUENCY_COUNT).count();
        score -= SEPARABILITY_PENALTY * low as f64;
    }

    if options.penalize_inversions {
        let inverted = curves.iter().filter(|curve| has_inversion(curve)).count();
        score -= SEPARABILITY_PENALTY * inverted as f64;
    }

    score
}

/// Separability of a scored frame with named bin, target and time columns.
///
/// Fails with `InvalidConfiguration` when a column does not exist.
pub fn separability_score_frame(
    df: &DataFrame,
    bin_col: &str,
    target_col: &str,
    time_col: &str,
    options: &SeparabilityOptions,
) -> Result<f64> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    for col in [bin_col, target_col, time_col] {
        if !names.iter().any(|n| n == col) {
            return Err(BinningError::config(format!(
                "Column '{}' not found in dataset",
                col
            )));
        }
    }

    let bins = df.column(bin_col)?.cast(&DataType::String)?;
    let labels: Vec<Option<String>> = bins
        .str()?
        .into_iter()
        .map(|v| v.map(|s| s.to_string()))
        .collect();
    let distinct: BTreeSet<&String> = labels.iter().flatten().collect();
    let distinct: Vec<&String> = distinct.into_iter().collect();

    let target = binary_target(df, target_col)?;
    let periods = period_values(df, time_col)?;

    let mut codes = Vec::with_capacity(labels.len());
    let mut kept_target = Vec::with_capacity(labels.len());
    let mut kept_periods = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        if let Some(label) = label {
            if let Ok(code) = distinct.binary_search(&label) {
                codes.push(code);
                kept_target.push(target[i]);
                kept_periods.push(periods[i].clone());
            }
        }
    }

    Ok(separability_score(&codes, &kept_target, &kept_periods, options))
}

fn has_inversion(curve: &[Option<f64>]) -> bool {
    let present: Vec<f64> = curve.iter().flatten().copied().collect();
    let mut rising = false;
    let mut falling = false;
    for pair in present.windows(2) {
        if pair[1] > pair[0] {
            rising = true;
        } else if pair[1] < pair[0] {
            falling = true;
        }
    }
    rising && falling
}
