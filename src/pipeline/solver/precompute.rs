//! Precomputation of IV values for every contiguous run of cells
//!
//! The MIP objective needs the IV of each candidate merged bin; cumulative
//! sums give all of them in O(n^2).

use super::CellStats;

/// Smoothing constant to avoid log(0) in the objective's WoE
const SMOOTHING: f64 = 0.5;

/// IV and event rate of a potential merged bin
#[derive(Debug, Clone)]
pub struct PrecomputedBin {
    /// Total count in merged bin
    pub count: f64,
    /// Event rate of merged bin
    pub event_rate: f64,
    /// IV contribution of merged bin
    pub iv: f64,
}

/// Smoothed IV contribution of a bin
fn smoothed_iv(events: f64, non_events: f64, total_events: f64, total_non_events: f64) -> f64 {
    let dist_events = (events + SMOOTHING) / (total_events + SMOOTHING);
    let dist_non_events = (non_events + SMOOTHING) / (total_non_events + SMOOTHING);
    (dist_events - dist_non_events) * (dist_events / dist_non_events).ln()
}

/// `matrix[i][j - i]` describes cells `i..=j` merged into one bin
#[allow(clippy::needless_range_loop)]
pub fn precompute_iv_matrix(cells: &[CellStats]) -> Vec<Vec<PrecomputedBin>> {
    let total_events: f64 = cells.iter().map(|c| c.events).sum();
    let total_non_events: f64 = cells.iter().map(|c| c.non_events).sum();

    let n = cells.len();
    let mut matrix = Vec::with_capacity(n);

    for i in 0..n {
        let mut row = Vec::with_capacity(n - i);
        let mut cumulative_events = 0.0;
        let mut cumulative_non_events = 0.0;

        for j in i..n {
            cumulative_events += cells[j].events;
            cumulative_non_events += cells[j].non_events;
            let count = cumulative_events + cumulative_non_events;

            row.push(PrecomputedBin {
                count,
                event_rate: if count > 0.0 { cumulative_events / count } else { 0.0 },
                iv: smoothed_iv(
                    cumulative_events,
                    cumulative_non_events,
                    total_events,
                    total_non_events,
                ),
            });
        }
        matrix.push(row);
    }

    matrix
}

#[inline]
pub fn get_precomputed_bin(
    matrix: &[Vec<PrecomputedBin>],
    start: usize,
    end: usize,
) -> &PrecomputedBin {
    &matrix[start][end - start]
}
