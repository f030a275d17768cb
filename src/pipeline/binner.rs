//! Orchestrator: fits one binning pipeline per feature
//!
//! `Binner` holds the configuration; `fit` selects the features of a frame,
//! runs split finding, refinement and (optionally) the hyperparameter search
//! for each of them in parallel and returns an immutable `FittedBinner`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::ProgressBar;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::bin_table::{period_values, BinTable, Period};
use super::features::{kind_of, FeatureKind, FeatureValues};
use super::iv::{bin_woe, information_value};
use super::refinement::{refine, RefineOptions, DEFAULT_MIN_EVENT_RATE_DIFF};
use super::search::{CandidateParams, RandomSearch, ScoreWeights, SearchObjective, Study};
use super::solver::Trend;
use super::stability::{event_rate_by_time, EventRatePivot};
use super::strategies::{
    splitter_for, tabulate, BinMapping, Encoding, SplitFinder, SplitParams, SplitterSettings,
    Strategy,
};
use super::target::binary_target;
use crate::error::{BinningError, Result};
use crate::utils::progress::{create_progress_bar, finish_with_success};

/// Default upper bound on bins per feature
pub const DEFAULT_MAX_BINS: usize = 6;

/// Default minimum share of rows per bin
pub const DEFAULT_MIN_BIN_SIZE: f64 = 0.05;

/// Hyperparameter search settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub driver: RandomSearch,
    pub weights: ScoreWeights,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            driver: RandomSearch::default(),
            weights: ScoreWeights::default(),
        }
    }
}

/// Configuration of a fit
#[derive(Debug, Clone)]
pub struct BinnerConfig {
    pub strategy: Strategy,
    pub max_bins: usize,
    pub min_bin_size: f64,
    pub min_event_rate_diff: f64,
    /// Event-rate trend enforced on numeric features
    pub monotonic: Option<Trend>,
    /// Attach the distribution shift to each feature's table (needs `time_col`)
    pub check_stability: bool,
    pub time_col: Option<String>,
    pub force_categorical: Vec<String>,
    pub force_numeric: Vec<String>,
    pub splitter: SplitterSettings,
    /// Run a random search per feature instead of using the fixed parameters
    pub search: Option<SearchConfig>,
    pub show_progress: bool,
}

impl Default for BinnerConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            max_bins: DEFAULT_MAX_BINS,
            min_bin_size: DEFAULT_MIN_BIN_SIZE,
            min_event_rate_diff: DEFAULT_MIN_EVENT_RATE_DIFF,
            monotonic: None,
            check_stability: false,
            time_col: None,
            force_categorical: Vec::new(),
            force_numeric: Vec::new(),
            splitter: SplitterSettings::default(),
            search: None,
            show_progress: false,
        }
    }
}

impl BinnerConfig {
    fn validate(&self) -> Result<()> {
        if self.max_bins < 2 {
            return Err(BinningError::config(format!(
                "max_bins must be at least 2, got {}",
                self.max_bins
            )));
        }
        if !(self.min_bin_size > 0.0 && self.min_bin_size <= 0.5) {
            return Err(BinningError::config(format!(
                "min_bin_size must be in (0, 0.5], got {}",
                self.min_bin_size
            )));
        }
        if !(0.0..1.0).contains(&self.splitter.rare_threshold) {
            return Err(BinningError::config(format!(
                "rare_threshold must be in [0, 1), got {}",
                self.splitter.rare_threshold
            )));
        }
        if !self.min_event_rate_diff.is_finite() || self.min_event_rate_diff < 0.0 {
            return Err(BinningError::config(format!(
                "min_event_rate_diff must be a non-negative number, got {}",
                self.min_event_rate_diff
            )));
        }
        if let Some(both) = self
            .force_categorical
            .iter()
            .find(|c| self.force_numeric.contains(c))
        {
            return Err(BinningError::config(format!(
                "Column '{}' is forced both categorical and numeric",
                both
            )));
        }
        Ok(())
    }
}

/// Inputs of one feature's pipeline
#[derive(Debug, Clone, Copy)]
pub struct FeatureData<'a> {
    pub variable: &'a str,
    pub values: &'a FeatureValues,
    pub target: &'a [u8],
    pub periods: Option<&'a [Period]>,
}

/// Refined table and the value mapping rebuilt for it
#[derive(Debug, Clone)]
pub struct FittedFeature {
    pub table: BinTable,
    pub mapping: BinMapping,
}

/// Split, tabulate (per period when available), drop summary and empty rows,
/// refine and rebuild the mapping
pub fn fit_refined(
    data: &FeatureData<'_>,
    splitter: &dyn SplitFinder,
    split: &SplitParams,
    refine_options: &RefineOptions,
) -> Result<FittedFeature> {
    let partition = splitter.fit(data.variable, data.values, data.target, split)?;

    let table = match data.periods {
        Some(periods) => {
            let codes = partition.mapping.assign(data.values);
            tabulate(
                data.variable,
                &partition.labels(),
                &codes,
                data.target,
                Some(periods),
            )
        }
        None => partition.table.clone(),
    };

    let refined = refine(&table.without_summary_rows(), refine_options)?;
    let mapping = partition.mapping.remap(&refined);

    Ok(FittedFeature {
        table: refined,
        mapping,
    })
}

/// Fitted result of one feature
#[derive(Debug, Clone, Serialize)]
pub struct FeaturePipeline {
    pub feature: String,
    pub kind: FeatureKind,
    pub table: BinTable,
    pub iv: f64,
    pub mapping: BinMapping,
    /// WoE per bin code
    pub woe: Vec<(usize, f64)>,
    /// Fewer than two bins survived
    pub degenerate: bool,
    pub best_params: Option<CandidateParams>,
    pub study: Option<Study>,
}

impl FeaturePipeline {
    pub fn n_bins(&self) -> usize {
        self.table.n_bins()
    }

    pub fn distribution_shift(&self) -> Option<f64> {
        self.table.attrs().distribution_shift
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.mapping.encoding()
    }

    /// Bin labels by code
    pub fn labels(&self) -> BTreeMap<usize, String> {
        self.table
            .aggregate()
            .into_iter()
            .map(|a| (a.code, a.bin))
            .collect()
    }

    /// Fail with `DegenerateResult` when fewer than two bins survived
    pub fn usable(&self) -> Result<&Self> {
        if self.degenerate {
            return Err(BinningError::DegenerateResult {
                feature: self.feature.clone(),
                bins: self.n_bins(),
            });
        }
        Ok(self)
    }

    fn woe_of(&self, code: usize) -> Option<f64> {
        self.woe.iter().find(|(c, _)| *c == code).map(|(_, w)| *w)
    }
}

/// A feature whose pipeline failed; the other features are unaffected
#[derive(Debug, Serialize)]
pub struct FeatureFailure {
    pub feature: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: BinningError,
}

fn serialize_error<S: serde::Serializer>(
    error: &BinningError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

/// Output of [`FittedBinner::transform`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransformOutput {
    /// Bin codes (UInt32, null for missing/unknown values)
    #[default]
    Codes,
    /// Bin labels
    Labels,
    /// WoE of the bin; ordinal-encoded features keep their code
    Woe,
}

impl std::str::FromStr for TransformOutput {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "codes" | "bins" => Ok(TransformOutput::Codes),
            "labels" => Ok(TransformOutput::Labels),
            "woe" => Ok(TransformOutput::Woe),
            _ => Err(format!(
                "Unknown transform output: '{}'. Use 'codes', 'labels', or 'woe'.",
                s
            )),
        }
    }
}

/// Binning orchestrator
#[derive(Debug, Clone, Default)]
pub struct Binner {
    config: BinnerConfig,
}

impl Binner {
    pub fn new(config: BinnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BinnerConfig {
        &self.config
    }

    /// Fit every feature of `df` against the binary `target_col`.
    ///
    /// Configuration, target and time-column problems fail the whole fit;
    /// per-feature problems are recorded in [`FittedBinner::failures`].
    pub fn fit(&self, df: &DataFrame, target_col: &str) -> Result<FittedBinner> {
        let config = &self.config;
        config.validate()?;

        let target = binary_target(df, target_col)?;

        let periods = match &config.time_col {
            Some(time_col) => {
                if !has_column(df, time_col) {
                    return Err(BinningError::config(format!(
                        "Time column '{}' not found in dataset",
                        time_col
                    )));
                }
                Some(period_values(df, time_col)?)
            }
            None => None,
        };

        for forced in config.force_categorical.iter().chain(&config.force_numeric) {
            if !has_column(df, forced) {
                warn!(column = forced.as_str(), "forced column not found in dataset");
            }
        }

        let (features, ignored) = self.select_features(df, target_col);
        info!(
            features = features.len(),
            ignored = ignored.len(),
            strategy = %config.strategy,
            search = config.search.is_some(),
            "fitting binner"
        );

        let pb = if config.show_progress {
            create_progress_bar(features.len() as u64, "Binning features")
        } else {
            ProgressBar::hidden()
        };
        let processed = AtomicU64::new(0);

        let results: Vec<std::result::Result<FeaturePipeline, FeatureFailure>> = features
            .par_iter()
            .map(|(name, kind)| {
                let result = self
                    .fit_feature(df, name, *kind, &target, periods.as_deref())
                    .map_err(|error| {
                        warn!(feature = name.as_str(), error = %error, "feature failed");
                        FeatureFailure {
                            feature: name.clone(),
                            error,
                        }
                    });
                let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
                pb.set_position(done);
                result
            })
            .collect();

        finish_with_success(&pb, "Binning complete");

        let mut fitted = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(pipeline) => fitted.push(pipeline),
                Err(failure) => failures.push(failure),
            }
        }

        Ok(FittedBinner {
            target_col: target_col.to_string(),
            time_col: config.time_col.clone(),
            features: fitted,
            failures,
            ignored,
        })
    }

    /// Binnable features with their kind, plus the names of ignored columns
    fn select_features(
        &self,
        df: &DataFrame,
        target_col: &str,
    ) -> (Vec<(String, FeatureKind)>, Vec<String>) {
        let config = &self.config;
        let mut features = Vec::new();
        let mut ignored = Vec::new();

        for col in df.get_columns() {
            let name = col.name().to_string();
            if name == target_col || config.time_col.as_deref() == Some(name.as_str()) {
                continue;
            }

            let detected = kind_of(col.dtype());
            let kind = if config.force_categorical.contains(&name) {
                Some(FeatureKind::Categorical)
            } else if config.force_numeric.contains(&name) {
                Some(FeatureKind::Numeric)
            } else if config.strategy == Strategy::Categorical {
                detected.map(|_| FeatureKind::Categorical)
            } else {
                detected
            };

            match kind {
                Some(kind) => features.push((name, kind)),
                None => {
                    debug!(column = name.as_str(), dtype = %col.dtype(), "ignoring column");
                    ignored.push(name);
                }
            }
        }

        (features, ignored)
    }

    fn fit_feature(
        &self,
        df: &DataFrame,
        name: &str,
        kind: FeatureKind,
        target: &[u8],
        periods: Option<&[Period]>,
    ) -> Result<FeaturePipeline> {
        let config = &self.config;
        let values = FeatureValues::from_column(df, name, kind)?;
        let splitter = splitter_for(&config.strategy, kind, &config.splitter);
        let trend = match kind {
            FeatureKind::Numeric => config.monotonic,
            FeatureKind::Categorical => None,
        };
        let data = FeatureData {
            variable: name,
            values: &values,
            target,
            periods,
        };

        let (params, study) = match &config.search {
            Some(search) => {
                let objective = SearchObjective {
                    data,
                    splitter: splitter.as_ref(),
                    trend,
                    weights: search.weights,
                };
                let (study, best) = objective.search(&search.driver);
                (best, Some(study))
            }
            None => (None, None),
        };

        let chosen = params.unwrap_or(CandidateParams {
            max_bins: config.max_bins,
            min_bin_size: config.min_bin_size,
            min_event_rate_diff: config.min_event_rate_diff,
        });

        let split = SplitParams {
            max_bins: chosen.max_bins,
            min_bin_size: chosen.min_bin_size,
            trend,
        };
        let refine_options = RefineOptions {
            min_event_rate_diff: chosen.min_event_rate_diff,
            trend,
            check_stability: config.check_stability,
        };

        let fitted = fit_refined(&data, splitter.as_ref(), &split, &refine_options)?;
        let iv = information_value(&fitted.table);
        let woe = bin_woe(&fitted.table);
        let n_bins = fitted.table.n_bins();
        let degenerate = n_bins < 2;

        if degenerate {
            warn!(feature = name, bins = n_bins, "feature collapsed to fewer than 2 bins");
        }
        debug!(feature = name, kind = %kind, bins = n_bins, iv, "feature fitted");

        Ok(FeaturePipeline {
            feature: name.to_string(),
            kind,
            table: fitted.table,
            iv,
            mapping: fitted.mapping,
            woe,
            degenerate,
            best_params: params,
            study,
        })
    }
}

/// Immutable result of [`Binner::fit`]
#[derive(Debug)]
pub struct FittedBinner {
    target_col: String,
    time_col: Option<String>,
    features: Vec<FeaturePipeline>,
    failures: Vec<FeatureFailure>,
    ignored: Vec<String>,
}

impl FittedBinner {
    pub fn target_col(&self) -> &str {
        &self.target_col
    }

    pub fn time_col(&self) -> Option<&str> {
        self.time_col.as_deref()
    }

    /// Fitted features in column order
    pub fn features(&self) -> &[FeaturePipeline] {
        &self.features
    }

    pub fn feature(&self, name: &str) -> Option<&FeaturePipeline> {
        self.features.iter().find(|f| f.feature == name)
    }

    pub fn failures(&self) -> &[FeatureFailure] {
        &self.failures
    }

    /// Columns skipped because of their dtype
    pub fn ignored(&self) -> &[String] {
        &self.ignored
    }

    /// Union of every feature's refined bin table
    pub fn bin_summary(&self) -> BinTable {
        BinTable::new(
            self.features
                .iter()
                .flat_map(|f| f.table.rows().iter().cloned())
                .collect(),
        )
    }

    /// Sum of per-feature IV
    pub fn total_iv(&self) -> f64 {
        self.features.iter().map(|f| f.iv).sum()
    }

    /// Bin label of each code of a feature
    pub fn bin_code_to_label(&self, feature: &str) -> Option<BTreeMap<usize, String>> {
        self.feature(feature).map(|f| f.labels())
    }

    /// Category to code mapping of a categorical feature
    pub fn category_mapping(&self, feature: &str) -> Option<&BTreeMap<String, usize>> {
        match &self.feature(feature)?.mapping {
            BinMapping::Categorical { categories, .. } => Some(categories),
            BinMapping::Numeric { .. } => None,
        }
    }

    /// Replace every fitted feature column with its binned form; other
    /// columns are kept unchanged
    pub fn transform(&self, df: &DataFrame, output: TransformOutput) -> Result<DataFrame> {
        for feature in &self.features {
            if !has_column(df, &feature.feature) {
                return Err(BinningError::config(format!(
                    "Feature column '{}' not found in dataset",
                    feature.feature
                )));
            }
        }

        let mut columns = Vec::with_capacity(df.width());
        for col in df.get_columns() {
            let name = col.name().to_string();
            let Some(feature) = self.feature(&name) else {
                columns.push(col.clone());
                continue;
            };

            let values = FeatureValues::from_column(df, &name, feature.kind)?;
            let codes = feature.mapping.assign(&values);

            let column = match output {
                TransformOutput::Codes => {
                    let data: Vec<Option<u32>> =
                        codes.iter().map(|c| c.map(|c| c as u32)).collect();
                    Column::new(name.as_str().into(), data)
                }
                TransformOutput::Labels => {
                    let labels = feature.labels();
                    let data: Vec<Option<String>> = codes
                        .iter()
                        .map(|c| c.and_then(|c| labels.get(&c).cloned()))
                        .collect();
                    Column::new(name.as_str().into(), data)
                }
                TransformOutput::Woe => {
                    let ordinal = feature.encoding() == Some(Encoding::Ordinal);
                    let data: Vec<Option<f64>> = codes
                        .iter()
                        .map(|c| {
                            c.and_then(|c| {
                                if ordinal {
                                    Some(c as f64)
                                } else {
                                    feature.woe_of(c)
                                }
                            })
                        })
                        .collect();
                    Column::new(name.as_str().into(), data)
                }
            };
            columns.push(column);
        }

        Ok(DataFrame::new(columns)?)
    }

    /// Zero-filled (feature, bin) x period event-rate matrix of `df` under the
    /// fitted mappings
    pub fn stability_over_time(
        &self,
        df: &DataFrame,
        target_col: &str,
        time_col: &str,
    ) -> Result<EventRatePivot> {
        if !has_column(df, time_col) {
            return Err(BinningError::config(format!(
                "Time column '{}' not found in dataset",
                time_col
            )));
        }
        let target = binary_target(df, target_col)?;
        let periods = period_values(df, time_col)?;

        let mut rows = Vec::new();
        for feature in &self.features {
            let values = FeatureValues::from_column(df, &feature.feature, feature.kind)?;
            let codes = feature.mapping.assign(&values);
            let labels: Vec<String> = feature.labels().into_values().collect();
            let table = tabulate(&feature.feature, &labels, &codes, &target, Some(&periods));
            rows.extend(table.into_rows());
        }

        if rows.is_empty() {
            return Ok(EventRatePivot::default());
        }
        Ok(event_rate_by_time(&BinTable::new(rows))?.zero_filled())
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_frame() -> DataFrame {
        let n = 200;
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<i32> = (0..n).map(|i| i32::from(i >= 100 && i % 3 != 0)).collect();
        let month: Vec<i64> = (0..n).map(|i| 202301 + (i % 2) as i64).collect();
        let flag: Vec<bool> = (0..n).map(|i| i % 2 == 0).collect();
        df! {
            "x" => x,
            "y" => y,
            "month" => month,
            "flag" => flag,
        }
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        let bad = BinnerConfig {
            max_bins: 1,
            ..Default::default()
        };
        assert!(matches!(
            Binner::new(bad).fit(&small_frame(), "y"),
            Err(BinningError::InvalidConfiguration(_))
        ));

        let both = BinnerConfig {
            force_categorical: vec!["x".to_string()],
            force_numeric: vec!["x".to_string()],
            ..Default::default()
        };
        assert!(Binner::new(both).fit(&small_frame(), "y").is_err());
    }

    #[test]
    fn test_missing_time_column_is_configuration_error() {
        let config = BinnerConfig {
            time_col: Some("safra".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Binner::new(config).fit(&small_frame(), "y"),
            Err(BinningError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_feature_selection() {
        let config = BinnerConfig {
            time_col: Some("month".to_string()),
            ..Default::default()
        };
        let binner = Binner::new(config);
        let (features, ignored) = binner.select_features(&small_frame(), "y");
        assert_eq!(features, vec![("x".to_string(), FeatureKind::Numeric)]);
        assert_eq!(ignored, vec!["flag".to_string()]);
    }

    #[test]
    fn test_categorical_strategy_forces_all_features() {
        let config = BinnerConfig {
            strategy: Strategy::Categorical,
            time_col: Some("month".to_string()),
            ..Default::default()
        };
        let (features, _) = Binner::new(config).select_features(&small_frame(), "y");
        assert_eq!(features, vec![("x".to_string(), FeatureKind::Categorical)]);
    }

    #[test]
    fn test_transform_output_from_str() {
        assert_eq!("woe".parse::<TransformOutput>().unwrap(), TransformOutput::Woe);
        assert_eq!("labels".parse::<TransformOutput>().unwrap(), TransformOutput::Labels);
        assert!("scores".parse::<TransformOutput>().is_err());
    }
}
