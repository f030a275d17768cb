//! Supervised numeric split finder
//!
//! Values are first cut into fine pre-bins (equal-frequency or CART-style
//! Gini splits), then the MIP solver groups adjacent pre-bins into at most
//! `max_bins` bins maximizing IV, honouring the minimum bin size and the
//! optional event-rate trend.

use serde::Serialize;
use tracing::debug;

use super::{interval_labels, tabulate, BinMapping, Partition, SplitFinder, SplitParams};
use crate::error::{BinningError, Result};
use crate::pipeline::features::FeatureValues;
use crate::pipeline::solver::{solve_optimal_grouping, CellStats, SolverConfig};

/// Default number of pre-bins before grouping
pub const DEFAULT_PREBINS: usize = 20;

/// Minimum samples on each side of a CART split
const MIN_PREBIN_SAMPLES: usize = 5;

/// Pre-binning method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PrebinMethod {
    /// Equal-frequency pre-bins
    #[default]
    Quantile,
    /// CART-style decision tree splits maximizing Gini reduction
    Cart,
}

impl std::fmt::Display for PrebinMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrebinMethod::Quantile => write!(f, "quantile"),
            PrebinMethod::Cart => write!(f, "cart"),
        }
    }
}

impl std::str::FromStr for PrebinMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quantile" => Ok(PrebinMethod::Quantile),
            "cart" => Ok(PrebinMethod::Cart),
            _ => Err(format!(
                "Unknown prebinning method: '{}'. Use 'quantile' or 'cart'.",
                s
            )),
        }
    }
}

/// Pre-binning followed by IV-optimal grouping
#[derive(Debug, Clone)]
pub struct SupervisedSplitter {
    prebins: usize,
    method: PrebinMethod,
}

impl SupervisedSplitter {
    pub fn new(prebins: usize, method: PrebinMethod) -> Self {
        Self {
            prebins: prebins.max(2),
            method,
        }
    }
}

impl SplitFinder for SupervisedSplitter {
    fn fit(
        &self,
        variable: &str,
        values: &FeatureValues,
        target: &[u8],
        params: &SplitParams,
    ) -> Result<Partition> {
        let FeatureValues::Numeric(raw) = values else {
            return Err(BinningError::config(format!(
                "Supervised split finder needs numeric values for '{}'",
                variable
            )));
        };

        let mut pairs: Vec<(f64, u8)> = raw
            .iter()
            .zip(target)
            .filter_map(|(v, t)| v.map(|x| (x, *t)))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let cuts = match self.method {
            PrebinMethod::Quantile => quantile_cuts(&pairs, self.prebins),
            PrebinMethod::Cart => cart_cuts(&pairs, self.prebins, MIN_PREBIN_SAMPLES),
        };

        let edges = if pairs.is_empty() {
            Vec::new()
        } else {
            let cells = cell_stats(&pairs, &cuts);
            let config = SolverConfig {
                max_bins: params.max_bins,
                min_bin_samples: params.min_bin_samples(pairs.len()),
                trend: params.trend,
            };
            let result = solve_optimal_grouping(&cells, &config).map_err(|e| {
                BinningError::Solver {
                    feature: variable.to_string(),
                    message: format!("{e:#}"),
                }
            })?;

            debug!(
                feature = variable,
                prebins = cells.len(),
                bins = result.bin_boundaries.len(),
                iv = result.total_iv,
                "supervised grouping"
            );

            // the cut closing a group is the one after its last pre-bin
            result
                .bin_boundaries
                .iter()
                .filter_map(|(_, end)| cuts.get(*end).copied())
                .collect()
        };

        let mapping = BinMapping::Numeric { edges };
        let labels = match &mapping {
            BinMapping::Numeric { edges } => interval_labels(edges),
            BinMapping::Categorical { .. } => Vec::new(),
        };
        let codes = mapping.assign(values);
        let table = tabulate(variable, &labels, &codes, target, None);

        Ok(Partition { table, mapping })
    }
}

/// Event/non-event counts of the intervals defined by `cuts`
fn cell_stats(sorted_pairs: &[(f64, u8)], cuts: &[f64]) -> Vec<CellStats> {
    let mut cells = vec![CellStats::new(0.0, 0.0); cuts.len() + 1];
    for (value, target) in sorted_pairs {
        let cell = &mut cells[cuts.partition_point(|c| *c <= *value)];
        if *target == 1 {
            cell.events += 1.0;
        } else {
            cell.non_events += 1.0;
        }
    }
    cells
}

/// Equal-frequency cut points; ties never straddle a cut
fn quantile_cuts(sorted_pairs: &[(f64, u8)], num_prebins: usize) -> Vec<f64> {
    let n = sorted_pairs.len();
    if n == 0 {
        return Vec::new();
    }
    let bin_size = n.div_ceil(num_prebins).max(1);
    let min_value = sorted_pairs[0].0;

    let mut cuts: Vec<f64> = Vec::new();
    for idx in (bin_size..n).step_by(bin_size) {
        let cut = sorted_pairs[idx].0;
        if cut > min_value && cuts.last().map_or(true, |last| cut > *last) {
            cuts.push(cut);
        }
    }
    cuts
}

/// Gini impurity for binary classification: `2 * p * (1 - p)`
fn gini_impurity(events: f64, non_events: f64) -> f64 {
    let total = events + non_events;
    if total == 0.0 {
        return 0.0;
    }
    let p = events / total;
    2.0 * p * (1.0 - p)
}

/// Best split index (start of the right side) by Gini reduction
fn find_best_split(sorted_pairs: &[(f64, u8)], min_samples: usize) -> Option<usize> {
    let n = sorted_pairs.len();
    if n < 2 * min_samples {
        return None;
    }

    let total_events = sorted_pairs.iter().filter(|(_, t)| *t == 1).count() as f64;
    let total_non_events = n as f64 - total_events;
    let parent_gini = gini_impurity(total_events, total_non_events);

    let mut best_gain = 0.0;
    let mut best_split_idx = None;
    let mut left_events = 0.0f64;
    let mut left_non_events = 0.0f64;

    for i in 0..n - 1 {
        if sorted_pairs[i].1 == 1 {
            left_events += 1.0;
        } else {
            left_non_events += 1.0;
        }

        let left_count = i + 1;
        let right_count = n - left_count;
        if left_count < min_samples || right_count < min_samples {
            continue;
        }

        // Never split between equal values
        if sorted_pairs[i].0 == sorted_pairs[i + 1].0 {
            continue;
        }

        let right_events = total_events - left_events;
        let right_non_events = total_non_events - left_non_events;

        let left_prop = left_count as f64 / n as f64;
        let right_prop = right_count as f64 / n as f64;
        let weighted_child_gini = left_prop * gini_impurity(left_events, left_non_events)
            + right_prop * gini_impurity(right_events, right_non_events);

        let gain = parent_gini - weighted_child_gini;
        if gain > best_gain {
            best_gain = gain;
            best_split_idx = Some(i + 1);
        }
    }

    best_split_idx
}

fn find_cart_splits_recursive(
    sorted_pairs: &[(f64, u8)],
    offset: usize,
    max_splits: usize,
    min_samples: usize,
    split_indices: &mut Vec<usize>,
) {
    if max_splits == 0 || sorted_pairs.len() < 2 * min_samples {
        return;
    }

    if let Some(local_split_idx) = find_best_split(sorted_pairs, min_samples) {
        let global_split_idx = offset + local_split_idx;
        split_indices.push(global_split_idx);

        let (left, right) = sorted_pairs.split_at(local_split_idx);
        let remaining_splits = max_splits - 1;
        let left_splits = remaining_splits / 2;
        let right_splits = remaining_splits - left_splits;

        find_cart_splits_recursive(left, offset, left_splits, min_samples, split_indices);
        find_cart_splits_recursive(right, global_split_idx, right_splits, min_samples, split_indices);
    }
}

/// CART cut points for at most `max_bins` pre-bins
fn cart_cuts(sorted_pairs: &[(f64, u8)], max_bins: usize, min_samples: usize) -> Vec<f64> {
    let mut split_indices = Vec::new();
    find_cart_splits_recursive(
        sorted_pairs,
        0,
        max_bins.saturating_sub(1),
        min_samples,
        &mut split_indices,
    );
    split_indices.sort_unstable();
    split_indices.dedup();
    split_indices.into_iter().map(|i| sorted_pairs[i].0).collect()
}
