//! Command-line argument definitions using clap

use std::path::PathBuf;

use clap::Parser;

use crate::pipeline::{
    BinnerConfig, PrebinMethod, RandomSearch, ScoreWeights, SearchConfig, SplitterSettings,
    Strategy, TransformOutput, Trend, UnsupervisedMethod, DEFAULT_INFER_SCHEMA_LENGTH,
};

/// nasabin - Bin features against a binary target with event-rate refinement
/// and temporal stability checks
#[derive(Parser, Debug)]
#[command(name = "nasabin")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Input file path (CSV or Parquet)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Binary (0/1) target column name
    #[arg(short, long)]
    pub target: String,

    /// Binning strategy: "supervised" (default), "unsupervised" or "categorical"
    #[arg(long, default_value = "supervised")]
    pub strategy: Strategy,

    /// Discretization method for the unsupervised strategy:
    /// "quantile" (default), "uniform" or "kmeans"
    #[arg(long, default_value = "quantile")]
    pub method: UnsupervisedMethod,

    /// Number of bins for the unsupervised strategy
    #[arg(long, default_value = "10")]
    pub n_bins: usize,

    /// Maximum number of bins per feature
    #[arg(long, default_value = "6")]
    pub max_bins: usize,

    /// Minimum share of rows per bin (0 to 0.5)
    #[arg(long, default_value = "0.05", value_parser = validate_min_bin_size)]
    pub min_bin_size: f64,

    /// Adjacent bins whose event rates differ by less than this are merged
    #[arg(long, default_value = "0.02", value_parser = validate_non_negative)]
    pub min_event_rate_diff: f64,

    /// Event-rate trend enforced on numeric features:
    /// "none" (default), "ascending" or "descending"
    #[arg(long, default_value = "none")]
    pub monotonic: String,

    /// Compute the distribution shift of every feature between the first
    /// and last period (requires --time-col)
    #[arg(long, default_value = "false")]
    pub check_stability: bool,

    /// Period column (e.g. 202301) used for stability metrics
    #[arg(long)]
    pub time_col: Option<String>,

    /// Columns binned as categorical regardless of dtype (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub force_categorical: Vec<String>,

    /// Columns binned as numeric regardless of dtype (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub force_numeric: Vec<String>,

    /// Columns to drop before binning (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub drop_columns: Vec<String>,

    /// Search max_bins, min_bin_size and min_event_rate_diff per feature
    /// with a seeded random search
    #[arg(long, default_value = "false")]
    pub search: bool,

    /// Number of search trials per feature
    #[arg(long, default_value = "20")]
    pub n_trials: usize,

    /// Seed of the random search
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Categories below this share of rows are collapsed into one bin
    #[arg(long, default_value = "0.01", value_parser = validate_rare_threshold)]
    pub rare_threshold: f64,

    /// Number of prebins before optimal grouping (supervised strategy)
    #[arg(long, default_value = "20")]
    pub prebins: usize,

    /// Prebinning method for the supervised strategy: "quantile" (default) or "cart"
    #[arg(long, default_value = "quantile")]
    pub prebin_method: PrebinMethod,

    /// Print the bins of every feature
    #[arg(long, default_value = "false")]
    pub show_bins: bool,

    /// Write the transformed dataset here (CSV or Parquet, by extension)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Values written for binned features: "codes" (default), "labels" or "woe"
    #[arg(long, default_value = "codes")]
    pub transform: TransformOutput,

    /// Number of rows to use for schema inference (CSV only)
    #[arg(long, default_value_t = DEFAULT_INFER_SCHEMA_LENGTH)]
    pub infer_schema_length: usize,

    /// Hide the progress bar
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: tracing::Level,
}

impl Cli {
    /// Binner configuration described by the flags
    pub fn binner_config(&self) -> crate::error::Result<BinnerConfig> {
        let strategy = match self.strategy {
            Strategy::Unsupervised { .. } => Strategy::Unsupervised {
                method: self.method,
                n_bins: self.n_bins,
            },
            other => other,
        };
        let monotonic: Option<Trend> = Trend::from_literal(&self.monotonic)?;

        let search = self.search.then(|| SearchConfig {
            driver: RandomSearch {
                n_trials: self.n_trials,
                seed: self.seed,
            },
            weights: ScoreWeights::default(),
        });

        Ok(BinnerConfig {
            strategy,
            max_bins: self.max_bins,
            min_bin_size: self.min_bin_size,
            min_event_rate_diff: self.min_event_rate_diff,
            monotonic,
            check_stability: self.check_stability,
            time_col: self.time_col.clone(),
            force_categorical: self.force_categorical.clone(),
            force_numeric: self.force_numeric.clone(),
            splitter: SplitterSettings {
                prebins: self.prebins,
                prebin_method: self.prebin_method,
                rare_threshold: self.rare_threshold,
            },
            search,
            show_progress: !self.quiet,
        })
    }

    /// Settings shown on the configuration card
    pub fn settings_summary(&self, config: &BinnerConfig) -> Vec<(&'static str, String)> {
        let mut settings = vec![
            ("Strategy", config.strategy.to_string()),
            ("Max bins", config.max_bins.to_string()),
            ("Min bin size", format!("{:.1}%", config.min_bin_size * 100.0)),
            ("Min event rate diff", format!("{:.3}", config.min_event_rate_diff)),
            (
                "Monotonic",
                config
                    .monotonic
                    .map_or_else(|| "none".to_string(), |t| t.to_string()),
            ),
        ];
        if let Some(time_col) = &config.time_col {
            settings.push(("Time column", time_col.clone()));
        }
        if let Some(search) = &config.search {
            settings.push((
                "Search",
                format!("{} trials, seed {}", search.driver.n_trials, search.driver.seed),
            ));
        }
        settings
    }
}

fn parse_number(s: &str) -> Result<f64, String> {
    s.parse()
        .map_err(|_| format!("'{}' is not a valid number", s))
}

/// Validator for min_bin_size parameter
fn validate_min_bin_size(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value > 0.0 && value <= 0.5 {
        Ok(value)
    } else {
        Err(format!("min_bin_size must be in (0, 0.5], got {}", value))
    }
}

fn validate_non_negative(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("value must be a non-negative number, got {}", value))
    }
}

/// Validator for rare_threshold parameter
fn validate_rare_threshold(s: &str) -> Result<f64, String> {
    let value = parse_number(s)?;
    if (0.0..1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("rare_threshold must be in [0, 1), got {}", value))
    }
}
