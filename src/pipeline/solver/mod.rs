//! Solver-based optimal grouping using Mixed Integer Programming (MIP)
//!
//! Cells (numeric pre-bins in value order, or categories sorted by event
//! rate) are grouped into contiguous runs that maximize Information Value
//! using the HiGHS solver via good_lp, optionally subject to a monotonic
//! event-rate trend.

mod model;
mod monotonicity;
mod precompute;

use anyhow::Result;

pub use monotonicity::Trend;

/// Configuration for one grouping problem
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Upper bound on the number of final bins
    pub max_bins: usize,
    /// Minimum samples per final bin
    pub min_bin_samples: usize,
    /// Optional event-rate trend across final bins
    pub trend: Option<Trend>,
}

/// Result from the grouping solver
#[derive(Debug, Clone)]
pub struct SolverResult {
    /// Inclusive `(start, end)` cell ranges, one per final bin, in order
    pub bin_boundaries: Vec<(usize, usize)>,
    /// Smoothed IV of the selected grouping
    pub total_iv: f64,
    pub solve_time_ms: u64,
}

/// Event/non-event totals of one groupable cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellStats {
    pub events: f64,
    pub non_events: f64,
}

impl CellStats {
    pub fn new(events: f64, non_events: f64) -> Self {
        Self { events, non_events }
    }

    pub fn count(&self) -> f64 {
        self.events + self.non_events
    }

    pub fn event_rate(&self) -> f64 {
        let count = self.count();
        if count > 0.0 {
            self.events / count
        } else {
            0.0
        }
    }
}

/// Find the IV-optimal grouping of adjacent cells
pub fn solve_optimal_grouping(cells: &[CellStats], config: &SolverConfig) -> Result<SolverResult> {
    model::solve_grouping(cells, config)
}
