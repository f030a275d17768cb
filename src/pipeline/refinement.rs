//! Post-hoc refinement of a candidate partition
//!
//! Adjacent bins whose event rates are closer than a minimum delta are merged,
//! then an optional monotonic trend is enforced by merging the first bin that
//! breaks it with its successor. When rows carry periods every decision is
//! taken on per-bin totals and applied to all period rows of the bins
//! involved, so per-period counts are conserved.

use tracing::debug;

use super::bin_table::{event_rate, BinRow, BinTable, TableAttrs};
use super::solver::Trend;
use super::stability::{distribution_shift, event_rate_by_time};
use crate::error::{BinningError, Result};

/// Default minimum event-rate gap between adjacent bins
pub const DEFAULT_MIN_EVENT_RATE_DIFF: f64 = 0.02;

/// Options for [`refine`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefineOptions {
    /// Adjacent bins closer than this (strictly) are merged
    pub min_event_rate_diff: f64,
    /// Optional direction the event rate must follow across bins
    pub trend: Option<Trend>,
    /// Attach the first-vs-last period distribution shift to the result
    pub check_stability: bool,
}

impl Default for RefineOptions {
    fn default() -> Self {
        Self {
            min_event_rate_diff: DEFAULT_MIN_EVENT_RATE_DIFF,
            trend: None,
            check_stability: false,
        }
    }
}

/// One logical bin: all of its period rows plus the lineage of merged cells
#[derive(Debug, Clone)]
struct Group {
    label: String,
    rows: Vec<BinRow>,
    lineage: Vec<usize>,
}

impl Group {
    fn rate(&self) -> Option<f64> {
        let event: u64 = self.rows.iter().map(|r| r.event).sum();
        let count: u64 = self.rows.iter().map(|r| r.count).sum();
        event_rate(event, count)
    }

    fn absorb(&mut self, other: Group) {
        self.label = merge_labels(&self.label, &other.label);
        for row in other.rows {
            match self.rows.iter_mut().find(|r| r.period == row.period) {
                Some(target) => target.absorb(&row),
                None => self.rows.push(row),
            }
        }
        self.lineage.extend(other.lineage);
        self.lineage.sort_unstable();
        self.lineage.dedup();
    }
}

/// Refine a bin table. The input is never modified.
///
/// Fails with `InvalidConfiguration` for a negative or non-finite threshold.
pub fn refine(table: &BinTable, options: &RefineOptions) -> Result<BinTable> {
    let min_diff = options.min_event_rate_diff;
    if !min_diff.is_finite() || min_diff < 0.0 {
        return Err(BinningError::config(format!(
            "min_event_rate_diff must be a non-negative number, got {}",
            min_diff
        )));
    }

    let mut groups = group_rows(table);
    let initial = groups.len();

    let mut merges = delta_pass(&mut groups, min_diff);
    if let Some(trend) = options.trend {
        let trend_merges = monotonic_pass(&mut groups, trend);
        if trend_merges > 0 {
            merges += trend_merges + delta_pass(&mut groups, min_diff);
        }
    }

    debug!(
        variable = table.variable().unwrap_or_default(),
        initial_bins = initial,
        final_bins = groups.len(),
        merges,
        "refined bin table"
    );

    let mut attrs: TableAttrs = *table.attrs();
    let refined = BinTable::new(flatten(groups));

    if options.check_stability && refined.has_periods() {
        let pivot = event_rate_by_time(&refined)?.zero_filled();
        attrs.distribution_shift = Some(distribution_shift(&pivot));
    }

    Ok(refined.with_attrs(attrs))
}

/// Combine two adjacent labels. Intervals such as `[1.00, 2.00)` and
/// `[2.00, 3.00)` become `[1.00, 3.00)`; anything else is joined with ` | `.
pub fn merge_labels(left: &str, right: &str) -> String {
    match (interval_parts(left), interval_parts(right)) {
        (Some((lower, _)), Some((_, upper))) => format!("{}, {}", lower, upper),
        _ => format!("{} | {}", left, right),
    }
}

fn interval_parts(label: &str) -> Option<(&str, &str)> {
    let opens = label.starts_with('[') || label.starts_with('(');
    let closes = label.ends_with(')') || label.ends_with(']');
    if !opens || !closes || label.contains(" | ") {
        return None;
    }
    label.split_once(", ")
}

fn group_rows(table: &BinTable) -> Vec<Group> {
    let mut groups: Vec<(usize, Group)> = Vec::new();
    for row in table.rows() {
        match groups.iter_mut().find(|(code, _)| *code == row.code) {
            Some((_, group)) => {
                group.lineage.extend_from_slice(&row.merged_from);
                group.rows.push(row.clone());
            }
            None => groups.push((
                row.code,
                Group {
                    label: row.bin.clone(),
                    rows: vec![row.clone()],
                    lineage: row.merged_from.clone(),
                },
            )),
        }
    }

    groups
        .into_iter()
        .map(|(_, mut group)| {
            group.lineage.sort_unstable();
            group.lineage.dedup();
            group
        })
        .collect()
}

/// Merge `groups[i + 1]` into `groups[i]`
fn merge_at(groups: &mut Vec<Group>, i: usize) {
    let next = groups.remove(i + 1);
    groups[i].absorb(next);
}

fn delta_pass(groups: &mut Vec<Group>, min_diff: f64) -> usize {
    let mut merges = 0;
    let mut i = 0;
    while i + 1 < groups.len() {
        match (groups[i].rate(), groups[i + 1].rate()) {
            (Some(a), Some(b)) if (a - b).abs() < min_diff => {
                merge_at(groups, i);
                merges += 1;
            }
            _ => i += 1,
        }
    }
    merges
}

fn monotonic_pass(groups: &mut Vec<Group>, trend: Trend) -> usize {
    let mut merges = 0;
    while groups.len() > 2 {
        let violation = (0..groups.len() - 1).find(|&i| {
            match (groups[i].rate(), groups[i + 1].rate()) {
                (Some(a), Some(b)) => trend.is_violated_by(a, b),
                _ => false,
            }
        });
        match violation {
            Some(i) => {
                merge_at(groups, i);
                merges += 1;
            }
            None => break,
        }
    }
    merges
}

fn flatten(groups: Vec<Group>) -> Vec<BinRow> {
    let mut rows = Vec::new();
    for (code, group) in groups.into_iter().enumerate() {
        let mut group_rows = group.rows;
        group_rows.sort_by(|a, b| a.period.cmp(&b.period));
        for mut row in group_rows {
            row.code = code;
            row.bin = group.label.clone();
            row.merged_from = group.lineage.clone();
            rows.push(row);
        }
    }
    rows
}
