//! Split finders: turn raw feature values into a candidate partition
//!
//! Every split finder returns a [`Partition`]: the bin table of the cells it
//! found plus the [`BinMapping`] that assigns new values to those cells.

mod categorical;
mod supervised;
mod unsupervised;

use std::collections::BTreeMap;

use serde::Serialize;

pub use categorical::{CategoricalSplitter, DEFAULT_RARE_THRESHOLD, RARE_LABEL};
pub use supervised::{PrebinMethod, SupervisedSplitter, DEFAULT_PREBINS};
pub use unsupervised::{UnsupervisedMethod, UnsupervisedSplitter, DEFAULT_UNSUPERVISED_BINS};

use super::bin_table::{BinRow, BinTable, Period};
use super::features::{FeatureKind, FeatureValues};
use super::solver::Trend;
use crate::error::Result;

/// Binning strategy selected for a fit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Strategy {
    /// Target-aware pre-binning followed by IV-optimal grouping
    #[default]
    Supervised,
    /// Target-free discretization
    Unsupervised {
        method: UnsupervisedMethod,
        n_bins: usize,
    },
    /// Every feature is treated as categorical
    Categorical,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Supervised => write!(f, "supervised"),
            Strategy::Unsupervised { method, n_bins } => {
                write!(f, "unsupervised ({}, {} bins)", method, n_bins)
            }
            Strategy::Categorical => write!(f, "categorical"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "supervised" => Ok(Strategy::Supervised),
            "unsupervised" => Ok(Strategy::Unsupervised {
                method: UnsupervisedMethod::default(),
                n_bins: DEFAULT_UNSUPERVISED_BINS,
            }),
            "categorical" => Ok(Strategy::Categorical),
            _ => Err(format!(
                "Unknown strategy: '{}'. Use 'supervised', 'unsupervised', or 'categorical'.",
                s
            )),
        }
    }
}

/// Hyperparameters handed to a split finder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitParams {
    pub max_bins: usize,
    /// Minimum share of non-missing rows per bin
    pub min_bin_size: f64,
    pub trend: Option<Trend>,
}

impl SplitParams {
    /// Absolute minimum bin size for `n` observations
    pub fn min_bin_samples(&self, n: usize) -> usize {
        ((self.min_bin_size * n as f64).ceil() as usize).max(1)
    }
}

/// How categorical codes were produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Encoding {
    /// Categories grouped by the IV-optimal solver
    Woe,
    /// One code per category (solver fallback)
    Ordinal,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Woe => write!(f, "woe"),
            Encoding::Ordinal => write!(f, "ordinal"),
        }
    }
}

/// Value to bin code assignment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BinMapping {
    /// Interior cut points, ascending; bin `i` is `[edges[i-1], edges[i])`
    Numeric { edges: Vec<f64> },
    /// Category to code, rare categories included under their collapsed code
    Categorical {
        categories: BTreeMap<String, usize>,
        encoding: Encoding,
    },
}

impl BinMapping {
    pub fn encoding(&self) -> Option<Encoding> {
        match self {
            BinMapping::Numeric { .. } => None,
            BinMapping::Categorical { encoding, .. } => Some(*encoding),
        }
    }

    fn n_cells(&self) -> usize {
        match self {
            BinMapping::Numeric { edges } => edges.len() + 1,
            BinMapping::Categorical { categories, .. } => {
                categories.values().max().map(|m| m + 1).unwrap_or(0)
            }
        }
    }

    /// Bin code of every value; `None` for missing values and unseen categories
    pub fn assign(&self, values: &FeatureValues) -> Vec<Option<usize>> {
        match (self, values) {
            (BinMapping::Numeric { edges }, FeatureValues::Numeric(values)) => values
                .iter()
                .map(|v| v.map(|x| edges.partition_point(|e| *e <= x)))
                .collect(),
            (BinMapping::Categorical { categories, .. }, FeatureValues::Categorical(values)) => {
                values
                    .iter()
                    .map(|v| v.as_ref().and_then(|s| categories.get(s).copied()))
                    .collect()
            }
            _ => vec![None; values.len()],
        }
    }

    /// Rebuild the mapping for a refined table whose rows carry the lineage
    /// (`merged_from`) of the cells of this mapping
    pub fn remap(&self, refined: &BinTable) -> BinMapping {
        let n_cells = self.n_cells();
        let mut old_to_new: Vec<Option<usize>> = vec![None; n_cells];
        for row in refined.rows() {
            for &cell in &row.merged_from {
                if cell < n_cells {
                    old_to_new[cell] = Some(row.code);
                }
            }
        }

        match self {
            BinMapping::Numeric { edges } => {
                // cells dropped before refinement join their left neighbour
                let mut filled = Vec::with_capacity(n_cells);
                let mut last = old_to_new.iter().flatten().next().copied().unwrap_or(0);
                for code in &old_to_new {
                    if let Some(c) = code {
                        last = *c;
                    }
                    filled.push(last);
                }
                let edges = edges
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| filled[*i] != filled[*i + 1])
                    .map(|(_, e)| *e)
                    .collect();
                BinMapping::Numeric { edges }
            }
            BinMapping::Categorical {
                categories,
                encoding,
            } => BinMapping::Categorical {
                categories: categories
                    .iter()
                    .filter_map(|(cat, code)| old_to_new[*code].map(|c| (cat.clone(), c)))
                    .collect(),
                encoding: *encoding,
            },
        }
    }
}

/// Candidate partition produced by a split finder
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// One row per cell, codes `0..n` in partition order
    pub table: BinTable,
    pub mapping: BinMapping,
}

impl Partition {
    /// Cell labels in code order
    pub fn labels(&self) -> Vec<String> {
        self.table.aggregate().into_iter().map(|a| a.bin).collect()
    }
}

/// Split-finding routine for one feature
pub trait SplitFinder: Send + Sync {
    fn fit(
        &self,
        variable: &str,
        values: &FeatureValues,
        target: &[u8],
        params: &SplitParams,
    ) -> Result<Partition>;
}

/// Settings shared by the split finders that the hyperparameter search
/// does not touch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitterSettings {
    pub prebins: usize,
    pub prebin_method: PrebinMethod,
    pub rare_threshold: f64,
}

impl Default for SplitterSettings {
    fn default() -> Self {
        Self {
            prebins: DEFAULT_PREBINS,
            prebin_method: PrebinMethod::default(),
            rare_threshold: DEFAULT_RARE_THRESHOLD,
        }
    }
}

/// Split finder for a feature of the given kind under a strategy
pub fn splitter_for(
    strategy: &Strategy,
    kind: FeatureKind,
    settings: &SplitterSettings,
) -> Box<dyn SplitFinder> {
    match (strategy, kind) {
        (Strategy::Categorical, _) | (_, FeatureKind::Categorical) => {
            Box::new(CategoricalSplitter::new(settings.rare_threshold))
        }
        (Strategy::Supervised, FeatureKind::Numeric) => Box::new(SupervisedSplitter::new(
            settings.prebins,
            settings.prebin_method,
        )),
        (Strategy::Unsupervised { method, n_bins }, FeatureKind::Numeric) => {
            Box::new(UnsupervisedSplitter::new(*method, *n_bins))
        }
    }
}

/// Count events per cell (and per period when given) into a bin table.
///
/// Without periods every cell gets a row, empty ones included; with periods
/// only observed (cell, period) pairs get one. Rows with no code are skipped.
pub fn tabulate(
    variable: &str,
    labels: &[String],
    codes: &[Option<usize>],
    target: &[u8],
    periods: Option<&[Period]>,
) -> BinTable {
    let mut counts: BTreeMap<(usize, Option<Period>), (u64, u64)> = BTreeMap::new();
    if periods.is_none() {
        for code in 0..labels.len() {
            counts.insert((code, None), (0, 0));
        }
    }

    for (i, code) in codes.iter().enumerate() {
        let Some(code) = code else {
            continue;
        };
        let period = periods.map(|p| p[i].clone());
        let cell = counts.entry((*code, period)).or_insert((0, 0));
        if target[i] == 1 {
            cell.0 += 1;
        } else {
            cell.1 += 1;
        }
    }

    let rows = counts
        .into_iter()
        .filter(|((code, _), _)| *code < labels.len())
        .map(|((code, period), (event, non_event))| {
            BinRow::new(variable, labels[code].clone(), code, event, non_event, period)
        })
        .collect();
    BinTable::new(rows)
}

/// Interval labels for interior cut points
pub fn interval_labels(edges: &[f64]) -> Vec<String> {
    let mut labels = Vec::with_capacity(edges.len() + 1);
    let mut lower = "-inf".to_string();
    for (i, edge) in edges.iter().enumerate() {
        let open = if i == 0 { "(" } else { "[" };
        labels.push(format!("{}{}, {})", open, lower, edge));
        lower = edge.to_string();
    }
    let open = if edges.is_empty() { "(" } else { "[" };
    labels.push(format!("{}{}, +inf)", open, lower));
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("supervised".parse::<Strategy>().unwrap(), Strategy::Supervised);
        assert_eq!(
            "Unsupervised".parse::<Strategy>().unwrap(),
            Strategy::Unsupervised {
                method: UnsupervisedMethod::Quantile,
                n_bins: DEFAULT_UNSUPERVISED_BINS
            }
        );
        assert_eq!("categorical".parse::<Strategy>().unwrap(), Strategy::Categorical);
        let err = "magic".parse::<Strategy>().unwrap_err();
        assert!(err.contains("Unknown strategy"));
    }

    #[test]
    fn test_interval_labels() {
        assert_eq!(interval_labels(&[]), vec!["(-inf, +inf)"]);
        assert_eq!(
            interval_labels(&[1.5, 3.0]),
            vec!["(-inf, 1.5)", "[1.5, 3)", "[3, +inf)"]
        );
    }

    #[test]
    fn test_numeric_assignment() {
        let mapping = BinMapping::Numeric {
            edges: vec![1.0, 2.0],
        };
        let values = FeatureValues::Numeric(vec![Some(0.5), Some(1.0), Some(2.5), None]);
        assert_eq!(mapping.assign(&values), vec![Some(0), Some(1), Some(2), None]);
    }

    #[test]
    fn test_categorical_assignment_unknown_is_none() {
        let mapping = BinMapping::Categorical {
            categories: [("a".to_string(), 0), ("b".to_string(), 1)].into_iter().collect(),
            encoding: Encoding::Woe,
        };
        let values = FeatureValues::Categorical(vec![
            Some("b".to_string()),
            Some("z".to_string()),
            None,
        ]);
        assert_eq!(mapping.assign(&values), vec![Some(1), None, None]);
    }

    #[test]
    fn test_remap_numeric_after_merge() {
        let mapping = BinMapping::Numeric {
            edges: vec![1.0, 2.0, 3.0],
        };
        let mut merged = BinRow::new("x", "a", 0, 1, 1, None);
        merged.merged_from = vec![0, 1];
        let mut last = BinRow::new("x", "b", 1, 1, 1, None);
        last.merged_from = vec![2, 3];
        let refined = BinTable::new(vec![merged, last]);

        assert_eq!(
            mapping.remap(&refined),
            BinMapping::Numeric { edges: vec![2.0] }
        );
    }

    #[test]
    fn test_remap_numeric_dropped_cell_joins_left() {
        let mapping = BinMapping::Numeric {
            edges: vec![1.0, 2.0],
        };
        let first = BinRow::new("x", "a", 0, 1, 1, None);
        let mut last = BinRow::new("x", "c", 1, 1, 1, None);
        last.merged_from = vec![2];
        let refined = BinTable::new(vec![first, last]);

        assert_eq!(
            mapping.remap(&refined),
            BinMapping::Numeric { edges: vec![2.0] }
        );
    }

    #[test]
    fn test_remap_categorical() {
        let mapping = BinMapping::Categorical {
            categories: [("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 2)]
                .into_iter()
                .collect(),
            encoding: Encoding::Ordinal,
        };
        let mut merged = BinRow::new("x", "a | b", 0, 1, 1, None);
        merged.merged_from = vec![0, 1];
        let mut last = BinRow::new("x", "c", 1, 1, 1, None);
        last.merged_from = vec![2];

        let remapped = mapping.remap(&BinTable::new(vec![merged, last]));
        let values = FeatureValues::Categorical(vec![
            Some("a".to_string()),
            Some("b".to_string()),
            Some("c".to_string()),
        ]);
        assert_eq!(remapped.assign(&values), vec![Some(0), Some(0), Some(1)]);
        assert_eq!(remapped.encoding(), Some(Encoding::Ordinal));
    }

    #[test]
    fn test_tabulate_with_periods() {
        let labels = vec!["a".to_string(), "b".to_string()];
        let codes = vec![Some(0), Some(1), Some(0), None];
        let target = vec![0, 1, 1, 1];
        let periods = vec![Period::Int(1), Period::Int(1), Period::Int(2), Period::Int(2)];

        let table = tabulate("x", &labels, &codes, &target, Some(&periods));
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.total_count(), 3);
        assert_eq!(table.rows()[1].period, Some(Period::Int(2)));
        assert_eq!(table.rows()[1].event, 1);
    }

    #[test]
    fn test_tabulate_keeps_empty_cells_without_periods() {
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let codes = vec![Some(0), Some(2)];
        let target = vec![0, 1];
        let table = tabulate("x", &labels, &codes, &target, None);
        assert_eq!(table.rows().len(), 3);
        assert_eq!(table.rows()[1].count, 0);
    }
}
