//! MIP model construction and solving
//!
//! Interval formulation: `z[i][j] = 1` when cells `i..=j` form one final bin.
//! Every cell is covered exactly once, at most `max_bins` intervals are
//! selected, and with a trend any two adjacent intervals whose event rates
//! break it cannot both be selected.

use std::time::Instant;

use anyhow::{Context, Result};
use good_lp::{
    constraint, default_solver, variable, Expression, ProblemVariables, Solution, SolverModel,
    Variable,
};
use tracing::debug;

use super::monotonicity::Trend;
use super::precompute::{get_precomputed_bin, precompute_iv_matrix};
use super::{CellStats, SolverConfig, SolverResult};

/// Group adjacent cells into at most `config.max_bins` bins maximizing IV
pub fn solve_grouping(cells: &[CellStats], config: &SolverConfig) -> Result<SolverResult> {
    let start_time = Instant::now();
    let n = cells.len();

    if n == 0 {
        anyhow::bail!("No cells to group");
    }
    if config.max_bins == 0 {
        anyhow::bail!("max_bins must be at least 1");
    }

    let iv_matrix = precompute_iv_matrix(cells);

    // Nothing to merge when every cell is already admissible
    if n <= config.max_bins && already_admissible(cells, config) {
        let bin_boundaries: Vec<(usize, usize)> = (0..n).map(|i| (i, i)).collect();
        let total_iv = (0..n).map(|i| get_precomputed_bin(&iv_matrix, i, i).iv).sum();
        return Ok(SolverResult {
            bin_boundaries,
            total_iv,
            solve_time_ms: start_time.elapsed().as_millis() as u64,
        });
    }

    let mut vars = ProblemVariables::new();

    let mut z: Vec<Vec<Option<Variable>>> = Vec::with_capacity(n);
    for i in 0..n {
        let mut row = Vec::with_capacity(n - i);
        for j in i..n {
            let bin = get_precomputed_bin(&iv_matrix, i, j);
            // Only create variable if bin meets minimum sample requirement
            if bin.count >= config.min_bin_samples as f64 {
                row.push(Some(vars.add(variable().binary())));
            } else {
                row.push(None);
            }
        }
        z.push(row);
    }

    // Objective: sum of IV contributions for selected bins
    let mut objective_terms: Vec<Expression> = Vec::new();
    for i in 0..n {
        for j in i..n {
            if let Some(var) = z[i][j - i] {
                let bin = get_precomputed_bin(&iv_matrix, i, j);
                objective_terms.push(bin.iv * var);
            }
        }
    }
    let objective: Expression = objective_terms.into_iter().sum();

    let mut problem = vars.maximise(objective).using(default_solver);

    // At most K bins
    let bin_count: Expression = z
        .iter()
        .flat_map(|row| row.iter().filter_map(|v| *v))
        .sum();
    problem = problem.with(constraint!(bin_count <= config.max_bins as f64));

    // Each cell belongs to exactly one final bin
    for p in 0..n {
        let mut coverage_terms: Vec<Variable> = Vec::new();
        for i in 0..=p {
            for j in p..n {
                if let Some(var) = z[i][j - i] {
                    coverage_terms.push(var);
                }
            }
        }
        if coverage_terms.is_empty() {
            anyhow::bail!(
                "Cell {} cannot be covered by any bin with at least {} samples",
                p,
                config.min_bin_samples
            );
        }
        let coverage: Expression = coverage_terms.into_iter().sum();
        problem = problem.with(constraint!(coverage == 1.0));
    }

    // Adjacent bins that break the trend cannot both be selected
    if let Some(trend) = config.trend {
        for i1 in 0..n {
            for j1 in i1..n {
                let i2 = j1 + 1;
                if i2 >= n {
                    continue;
                }
                for j2 in i2..n {
                    if let (Some(v1), Some(v2)) = (z[i1][j1 - i1], z[i2][j2 - i2]) {
                        let bin1 = get_precomputed_bin(&iv_matrix, i1, j1);
                        let bin2 = get_precomputed_bin(&iv_matrix, i2, j2);
                        if trend.is_violated_by(bin1.event_rate, bin2.event_rate) {
                            let sum: Expression = v1 + v2;
                            problem = problem.with(constraint!(sum <= 1.0));
                        }
                    }
                }
            }
        }
    }

    let solution = problem.solve().context("Failed to solve MIP model")?;

    let mut bin_boundaries: Vec<(usize, usize)> = Vec::new();
    for i in 0..n {
        for j in i..n {
            if let Some(var) = z[i][j - i] {
                if solution.value(var) > 0.5 {
                    bin_boundaries.push((i, j));
                }
            }
        }
    }
    bin_boundaries.sort_by_key(|(start, _)| *start);

    let total_iv: f64 = bin_boundaries
        .iter()
        .map(|(start, end)| get_precomputed_bin(&iv_matrix, *start, *end).iv)
        .sum();

    let solve_time_ms = start_time.elapsed().as_millis() as u64;
    debug!(
        cells = n,
        bins = bin_boundaries.len(),
        total_iv,
        solve_time_ms,
        "solved grouping model"
    );

    Ok(SolverResult {
        bin_boundaries,
        total_iv,
        solve_time_ms,
    })
}

fn already_admissible(cells: &[CellStats], config: &SolverConfig) -> bool {
    let large_enough = cells
        .iter()
        .all(|c| c.count() >= config.min_bin_samples as f64);
    let follows_trend = match config.trend {
        Some(trend) => cells
            .windows(2)
            .all(|w| !trend.is_violated_by(w[0].event_rate(), w[1].event_rate())),
        None => true,
    };
    large_enough && follows_trend
}
