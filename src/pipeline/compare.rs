//! Side-by-side fits of several binner configurations on the same data

use polars::prelude::*;
use tracing::info;

use super::binner::{Binner, BinnerConfig, FittedBinner};
use super::strategies::Strategy;
use crate::error::{BinningError, Result};

/// One fitted configuration
#[derive(Debug)]
pub struct ComparisonRow {
    pub name: String,
    pub strategy: Strategy,
    pub total_iv: f64,
    /// Bins summed over all fitted features
    pub n_bins: usize,
    /// Largest per-feature distribution shift; `None` without stability checks
    pub distribution_shift: Option<f64>,
    pub failures: usize,
    pub fitted: FittedBinner,
}

/// Result of [`compare`], rows in configuration order
#[derive(Debug, Default)]
pub struct Comparison {
    rows: Vec<ComparisonRow>,
}

impl Comparison {
    pub fn rows(&self) -> &[ComparisonRow] {
        &self.rows
    }

    pub fn get(&self, name: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| r.name == name)
    }

    /// Summary frame: `name`, `strategy`, `iv`, `n_bins`, `distribution_shift`
    pub fn to_frame(&self) -> Result<DataFrame> {
        let name: Vec<&str> = self.rows.iter().map(|r| r.name.as_str()).collect();
        let strategy: Vec<String> = self.rows.iter().map(|r| r.strategy.to_string()).collect();
        let iv: Vec<f64> = self.rows.iter().map(|r| r.total_iv).collect();
        let n_bins: Vec<u64> = self.rows.iter().map(|r| r.n_bins as u64).collect();
        let shift: Vec<Option<f64>> = self.rows.iter().map(|r| r.distribution_shift).collect();

        Ok(DataFrame::new(vec![
            Column::new("name".into(), name),
            Column::new("strategy".into(), strategy),
            Column::new("iv".into(), iv),
            Column::new("n_bins".into(), n_bins),
            Column::new("distribution_shift".into(), shift),
        ])?)
    }
}

/// Fit every named configuration against `target_col`.
///
/// A `time_col` given here replaces the time column of every configuration.
/// The first configuration that fails as a whole aborts the comparison.
pub fn compare(
    df: &DataFrame,
    target_col: &str,
    time_col: Option<&str>,
    configs: Vec<(String, BinnerConfig)>,
) -> Result<Comparison> {
    let mut rows = Vec::with_capacity(configs.len());

    for (name, mut config) in configs {
        if rows.iter().any(|r: &ComparisonRow| r.name == name) {
            return Err(BinningError::config(format!(
                "Duplicate configuration name '{}'",
                name
            )));
        }
        if let Some(time_col) = time_col {
            config.time_col = Some(time_col.to_string());
        }
        let strategy = config.strategy;

        let fitted = Binner::new(config).fit(df, target_col).map_err(|e| match e {
            BinningError::InvalidConfiguration(message) => {
                BinningError::config(format!("{}: {}", name, message))
            }
            other => other,
        })?;

        let n_bins = fitted.features().iter().map(|f| f.n_bins()).sum();
        let distribution_shift = fitted
            .features()
            .iter()
            .filter_map(|f| f.distribution_shift())
            .reduce(f64::max);

        info!(
            config = name.as_str(),
            iv = fitted.total_iv(),
            bins = n_bins,
            "configuration fitted"
        );

        rows.push(ComparisonRow {
            name,
            strategy,
            total_iv: fitted.total_iv(),
            n_bins,
            distribution_shift,
            failures: fitted.failures().len(),
            fitted,
        });
    }

    Ok(Comparison { rows })
}
