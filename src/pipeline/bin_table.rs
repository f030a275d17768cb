//! Per-feature bin table
//!
//! A `BinTable` holds one row per bin (one per bin and period when a time
//! dimension is present). It is the value object passed between split
//! finders, refinement, metrics and the orchestrator.

use std::collections::BTreeMap;
use std::fmt;

use polars::prelude::*;
use serde::Serialize;

use crate::error::{BinningError, Result};

/// Canonical column name followed by every accepted alias, in lookup order.
///
/// Split finders name their columns differently ("Bin", "Event rate", ...);
/// tables read from a frame are normalized through this table only.
pub const COLUMN_ALIASES: &[(&str, &[&str])] = &[
    ("variable", &["variable", "Variable", "feature", "Feature"]),
    ("bin", &["bin", "Bin"]),
    ("count", &["count", "Count"]),
    ("event", &["event", "Event"]),
    ("non_event", &["non_event", "Non-event", "Non event", "NonEvent"]),
    ("event_rate", &["event_rate", "Event rate", "Event Rate"]),
];

/// Labels of summary rows that are not partition cells
pub const SUMMARY_LABELS: &[&str] = &["Totals", "Total", "Special", "Missing"];

/// Sortable period key (e.g. year-month `202301`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum Period {
    Int(i64),
    Text(String),
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Int(v) => write!(f, "{}", v),
            Period::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Period {
    fn from(value: i64) -> Self {
        Period::Int(value)
    }
}

impl From<&str> for Period {
    fn from(value: &str) -> Self {
        Period::Text(value.to_string())
    }
}

/// Event rate of a bin, undefined for empty bins
#[inline]
pub fn event_rate(event: u64, count: u64) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(event as f64 / count as f64)
    }
}

/// A single row of a bin table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRow {
    /// Feature identifier
    pub variable: String,
    /// Human readable bin label
    pub bin: String,
    /// Position of the logical bin in partition order
    #[serde(rename = "bin_code")]
    pub code: usize,
    pub count: u64,
    pub event: u64,
    pub non_event: u64,
    /// `event / count`, `None` when the bin is empty
    pub event_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    /// Partition cells this row was built from
    #[serde(skip)]
    pub merged_from: Vec<usize>,
}

impl BinRow {
    /// Build a row from event/non-event counts so `count == event + non_event` holds
    pub fn new(
        variable: impl Into<String>,
        bin: impl Into<String>,
        code: usize,
        event: u64,
        non_event: u64,
        period: Option<Period>,
    ) -> Self {
        let count = event + non_event;
        Self {
            variable: variable.into(),
            bin: bin.into(),
            code,
            count,
            event,
            non_event,
            event_rate: event_rate(event, count),
            period,
            merged_from: vec![code],
        }
    }

    /// Fold another row's counts and lineage into this one
    pub(crate) fn absorb(&mut self, other: &BinRow) {
        self.event += other.event;
        self.non_event += other.non_event;
        self.count += other.count;
        self.event_rate = event_rate(self.event, self.count);
        self.merged_from.extend_from_slice(&other.merged_from);
    }
}

/// Side metadata attached to a table (never stored as rows)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TableAttrs {
    /// First-vs-last period shift index, set by refinement with `check_stability`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_shift: Option<f64>,
}

/// Per-bin totals across all periods
#[derive(Debug, Clone, PartialEq)]
pub struct BinAggregate {
    pub code: usize,
    pub bin: String,
    pub count: u64,
    pub event: u64,
    pub non_event: u64,
    pub event_rate: Option<f64>,
}

/// Bin table for one feature
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BinTable {
    rows: Vec<BinRow>,
    attrs: TableAttrs,
}

impl BinTable {
    pub fn new(rows: Vec<BinRow>) -> Self {
        Self {
            rows,
            attrs: TableAttrs::default(),
        }
    }

    pub fn rows(&self) -> &[BinRow] {
        &self.rows
    }

    pub fn attrs(&self) -> &TableAttrs {
        &self.attrs
    }

    pub(crate) fn with_attrs(mut self, attrs: TableAttrs) -> Self {
        self.attrs = attrs;
        self
    }

    pub(crate) fn into_rows(self) -> Vec<BinRow> {
        self.rows
    }

    /// Feature identifier (taken from the first row)
    pub fn variable(&self) -> Option<&str> {
        self.rows.first().map(|r| r.variable.as_str())
    }

    pub fn has_periods(&self) -> bool {
        self.rows.iter().any(|r| r.period.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of logical bins (distinct codes)
    pub fn n_bins(&self) -> usize {
        self.aggregate().len()
    }

    pub fn total_count(&self) -> u64 {
        self.rows.iter().map(|r| r.count).sum()
    }

    /// Total count per period (`None` key for rows without a period)
    pub fn count_by_period(&self) -> BTreeMap<Option<Period>, u64> {
        let mut totals = BTreeMap::new();
        for row in &self.rows {
            *totals.entry(row.period.clone()).or_insert(0) += row.count;
        }
        totals
    }

    /// Sum rows of the same bin across periods, in partition order
    pub fn aggregate(&self) -> Vec<BinAggregate> {
        let mut out: Vec<BinAggregate> = Vec::new();
        for row in &self.rows {
            match out.iter_mut().find(|a| a.code == row.code) {
                Some(agg) => {
                    agg.event += row.event;
                    agg.non_event += row.non_event;
                    agg.count += row.count;
                    agg.event_rate = event_rate(agg.event, agg.count);
                }
                None => out.push(BinAggregate {
                    code: row.code,
                    bin: row.bin.clone(),
                    count: row.count,
                    event: row.event,
                    non_event: row.non_event,
                    event_rate: row.event_rate,
                }),
            }
        }
        out
    }

    /// Copy without summary rows (see [`SUMMARY_LABELS`]) and empty rows
    pub fn without_summary_rows(&self) -> BinTable {
        let rows = self
            .rows
            .iter()
            .filter(|r| r.count > 0 && !SUMMARY_LABELS.contains(&r.bin.as_str()))
            .cloned()
            .collect();
        BinTable {
            rows,
            attrs: self.attrs,
        }
    }

    /// Aggregate event rates in partition order
    pub fn event_rates(&self) -> Vec<Option<f64>> {
        self.aggregate().iter().map(|a| a.event_rate).collect()
    }

    /// Read a bin table from a frame, normalizing column names through
    /// [`COLUMN_ALIASES`].
    ///
    /// `variable`, `bin`, `count` and `event` are required; `non_event` and
    /// `event_rate` are derived when absent. When `time_col` is given the
    /// column must exist and each row is tagged with its period.
    pub fn from_frame(df: &DataFrame, time_col: Option<&str>) -> Result<Self> {
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        let variable_col = resolve_required(&names, "variable")?;
        let bin_col = resolve_required(&names, "bin")?;
        let count_col = resolve_required(&names, "count")?;
        let event_col = resolve_required(&names, "event")?;
        let non_event_col = resolve_column(&names, "non_event");

        let variables = string_values(df, &variable_col)?;
        let bins = string_values(df, &bin_col)?;
        let counts = count_values(df, &count_col)?;
        let events = count_values(df, &event_col)?;
        let non_events = match &non_event_col {
            Some(name) => Some(count_values(df, name)?),
            None => None,
        };

        let periods: Option<Vec<Period>> = match time_col {
            Some(name) => {
                if !names.iter().any(|n| n == name) {
                    return Err(BinningError::config(format!(
                        "Time column '{}' not found in bin table",
                        name
                    )));
                }
                Some(period_values(df, name)?)
            }
            None => None,
        };

        let mut codes: Vec<String> = Vec::new();
        let mut rows = Vec::with_capacity(df.height());

        for i in 0..df.height() {
            let count = counts[i];
            let event = events[i];
            if event > count {
                return Err(BinningError::InvalidColumn {
                    column: event_col.clone(),
                    reason: format!("row {} has event {} greater than count {}", i, event, count),
                });
            }
            let non_event = match &non_events {
                Some(values) => {
                    if values[i] + event != count {
                        return Err(BinningError::InvalidColumn {
                            column: non_event_col.clone().unwrap_or_default(),
                            reason: format!("row {} does not satisfy count == event + non_event", i),
                        });
                    }
                    values[i]
                }
                None => count - event,
            };

            let code = match codes.iter().position(|b| *b == bins[i]) {
                Some(code) => code,
                None => {
                    codes.push(bins[i].clone());
                    codes.len() - 1
                }
            };

            rows.push(BinRow::new(
                variables[i].clone(),
                bins[i].clone(),
                code,
                event,
                non_event,
                periods.as_ref().map(|p| p[i].clone()),
            ));
        }

        Ok(Self::new(rows))
    }

    /// Export the table with canonical column names
    pub fn to_frame(&self) -> Result<DataFrame> {
        let variable: Vec<String> = self.rows.iter().map(|r| r.variable.clone()).collect();
        let bin: Vec<String> = self.rows.iter().map(|r| r.bin.clone()).collect();
        let code: Vec<u64> = self.rows.iter().map(|r| r.code as u64).collect();
        let count: Vec<u64> = self.rows.iter().map(|r| r.count).collect();
        let event: Vec<u64> = self.rows.iter().map(|r| r.event).collect();
        let non_event: Vec<u64> = self.rows.iter().map(|r| r.non_event).collect();
        let rate: Vec<Option<f64>> = self.rows.iter().map(|r| r.event_rate).collect();

        let mut columns = vec![
            Column::new("variable".into(), variable),
            Column::new("bin".into(), bin),
            Column::new("bin_code".into(), code),
            Column::new("count".into(), count),
            Column::new("event".into(), event),
            Column::new("non_event".into(), non_event),
            Column::new("event_rate".into(), rate),
        ];

        if self.has_periods() {
            let all_int = self
                .rows
                .iter()
                .all(|r| matches!(r.period, Some(Period::Int(_)) | None));
            if all_int {
                let values: Vec<Option<i64>> = self
                    .rows
                    .iter()
                    .map(|r| match r.period {
                        Some(Period::Int(v)) => Some(v),
                        _ => None,
                    })
                    .collect();
                columns.push(Column::new("period".into(), values));
            } else {
                let values: Vec<Option<String>> = self
                    .rows
                    .iter()
                    .map(|r| r.period.as_ref().map(|p| p.to_string()))
                    .collect();
                columns.push(Column::new("period".into(), values));
            }
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Find the first accepted alias of `canonical` present in `names`
pub fn resolve_column(names: &[String], canonical: &str) -> Option<String> {
    COLUMN_ALIASES
        .iter()
        .find(|(name, _)| *name == canonical)
        .and_then(|(_, aliases)| {
            aliases
                .iter()
                .find(|alias| names.iter().any(|n| n == *alias))
                .map(|alias| alias.to_string())
        })
}

fn resolve_required(names: &[String], canonical: &'static str) -> Result<String> {
    resolve_column(names, canonical).ok_or_else(|| {
        let accepted = COLUMN_ALIASES
            .iter()
            .find(|(name, _)| *name == canonical)
            .map(|(_, aliases)| aliases.join(", "))
            .unwrap_or_default();
        BinningError::Schema {
            column: canonical,
            accepted,
        }
    })
}

fn string_values(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let col = df.column(name)?.cast(&DataType::String)?;
    col.str()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(|s| s.to_string())
                .ok_or_else(|| BinningError::InvalidColumn {
                    column: name.to_string(),
                    reason: format!("null value at row {}", i),
                })
        })
        .collect()
}

fn count_values(df: &DataFrame, name: &str) -> Result<Vec<u64>> {
    let col = df.column(name)?.cast(&DataType::Int64)?;
    col.i64()?
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            Some(n) if n >= 0 => Ok(n as u64),
            Some(n) => Err(BinningError::InvalidColumn {
                column: name.to_string(),
                reason: format!("negative count {} at row {}", n, i),
            }),
            None => Err(BinningError::InvalidColumn {
                column: name.to_string(),
                reason: format!("null value at row {}", i),
            }),
        })
        .collect()
}

/// Read a period column: integer dtypes keep their numeric order, anything
/// else is compared as text
pub fn period_values(df: &DataFrame, name: &str) -> Result<Vec<Period>> {
    let col = df.column(name)?;
    let values: Vec<Option<Period>> = if col.dtype().is_integer() {
        let cast = col.cast(&DataType::Int64)?;
        cast.i64()?.into_iter().map(|v| v.map(Period::Int)).collect()
    } else {
        let cast = col.cast(&DataType::String)?;
        cast.str()?
            .into_iter()
            .map(|v| v.map(|s| Period::Text(s.to_string())))
            .collect()
    };

    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| BinningError::InvalidColumn {
                column: name.to_string(),
                reason: format!("null period at row {}", i),
            })
        })
        .collect()
}
