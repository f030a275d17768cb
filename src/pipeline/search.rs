//! Hyperparameter search for a single feature
//!
//! Each trial proposes `max_bins`, `min_bin_size` and `min_event_rate_diff`,
//! fits and refines the feature with them and scores the result as
//! `alpha * separability + beta * iv + gamma * ks`. Partitions with fewer
//! than two bins get [`DEGENERATE_SCORE`].

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info};

use super::binner::{fit_refined, FeatureData};
use super::iv::information_value;
use super::refinement::RefineOptions;
use super::solver::Trend;
use super::stability::{
    event_rate_by_time, observations_table, separability_score, two_sample_distance,
    SeparabilityOptions,
};
use super::strategies::{SplitFinder, SplitParams};

/// Score given to partitions with fewer than two bins
pub const DEGENERATE_SCORE: f64 = -1e9;

/// Default number of trials per feature
pub const DEFAULT_N_TRIALS: usize = 20;

/// Search space of `max_bins` (inclusive)
pub const MAX_BINS_RANGE: (i64, i64) = (3, 10);
/// Search space of `min_bin_size` (inclusive)
pub const MIN_BIN_SIZE_RANGE: (f64, f64) = (0.01, 0.1);
/// Search space of `min_event_rate_diff` (inclusive)
pub const MIN_EVENT_RATE_DIFF_RANGE: (f64, f64) = (0.01, 0.1);

/// Trial interface of a search driver
pub trait Trial {
    fn number(&self) -> usize;
    fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> i64;
    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> f64;
    fn set_user_attr(&mut self, key: &str, value: f64);
}

/// A suggested parameter value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Float(v) => write!(f, "{:.4}", v),
        }
    }
}

/// Everything recorded for one finished trial
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrialRecord {
    pub number: usize,
    pub params: BTreeMap<String, ParamValue>,
    pub user_attrs: BTreeMap<String, f64>,
    pub score: f64,
}

/// Trial replaying fixed parameter values (clamped to the requested range)
#[derive(Debug, Clone, Default)]
pub struct FixedTrial {
    number: usize,
    params: BTreeMap<String, f64>,
    suggested: BTreeMap<String, ParamValue>,
    user_attrs: BTreeMap<String, f64>,
}

impl FixedTrial {
    pub fn new(params: impl IntoIterator<Item = (String, f64)>) -> Self {
        Self {
            params: params.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn user_attrs(&self) -> &BTreeMap<String, f64> {
        &self.user_attrs
    }

    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.suggested
    }
}

impl Trial for FixedTrial {
    fn number(&self) -> usize {
        self.number
    }

    fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> i64 {
        let value = self
            .params
            .get(name)
            .map(|v| v.round() as i64)
            .unwrap_or(low)
            .clamp(low, high);
        self.suggested.insert(name.to_string(), ParamValue::Int(value));
        value
    }

    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> f64 {
        let value = self.params.get(name).copied().unwrap_or(low).clamp(low, high);
        self.suggested.insert(name.to_string(), ParamValue::Float(value));
        value
    }

    fn set_user_attr(&mut self, key: &str, value: f64) {
        self.user_attrs.insert(key.to_string(), value);
    }
}

/// Trial sampling every parameter uniformly from a shared seeded RNG
struct SampledTrial<'a> {
    number: usize,
    rng: &'a mut StdRng,
    params: BTreeMap<String, ParamValue>,
    user_attrs: BTreeMap<String, f64>,
}

impl Trial for SampledTrial<'_> {
    fn number(&self) -> usize {
        self.number
    }

    fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> i64 {
        let value = if low >= high {
            low
        } else {
            self.rng.gen_range(low..=high)
        };
        self.params.insert(name.to_string(), ParamValue::Int(value));
        value
    }

    fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> f64 {
        let value = if low >= high {
            low
        } else {
            self.rng.gen_range(low..=high)
        };
        self.params.insert(name.to_string(), ParamValue::Float(value));
        value
    }

    fn set_user_attr(&mut self, key: &str, value: f64) {
        self.user_attrs.insert(key.to_string(), value);
    }
}

/// Seeded random-search driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RandomSearch {
    pub n_trials: usize,
    pub seed: u64,
}

impl Default for RandomSearch {
    fn default() -> Self {
        Self {
            n_trials: DEFAULT_N_TRIALS,
            seed: 42,
        }
    }
}

impl RandomSearch {
    /// Run `n_trials` trials, maximizing the objective
    pub fn optimize<F>(&self, mut objective: F) -> Study
    where
        F: FnMut(&mut dyn Trial) -> f64,
    {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trials = Vec::with_capacity(self.n_trials);

        for number in 0..self.n_trials {
            let mut trial = SampledTrial {
                number,
                rng: &mut rng,
                params: BTreeMap::new(),
                user_attrs: BTreeMap::new(),
            };
            let score = objective(&mut trial);
            trials.push(TrialRecord {
                number,
                params: trial.params,
                user_attrs: trial.user_attrs,
                score,
            });
        }

        Study { trials }
    }
}

/// All trials of one search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Study {
    pub trials: Vec<TrialRecord>,
}

impl Study {
    /// Highest-scoring trial; ties keep the earliest
    pub fn best_trial(&self) -> Option<&TrialRecord> {
        self.trials.iter().fold(None, |best: Option<&TrialRecord>, t| match best {
            Some(b) if b.score >= t.score => Some(b),
            _ => Some(t),
        })
    }
}

/// Weights of the composite score
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreWeights {
    pub separability: f64,
    pub iv: f64,
    pub ks: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            separability: 0.7,
            iv: 0.2,
            ks: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn score(&self, separability: f64, iv: f64, ks: f64) -> f64 {
        self.separability * separability + self.iv * iv + self.ks * ks
    }
}

/// Hyperparameters proposed by one trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CandidateParams {
    pub max_bins: usize,
    pub min_bin_size: f64,
    pub min_event_rate_diff: f64,
}

/// Score and metrics of one candidate
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrialOutcome {
    pub params: CandidateParams,
    pub score: f64,
    pub iv: f64,
    pub separability: f64,
    pub ks: f64,
    pub n_bins: usize,
}

/// Fixed inputs of the objective
pub struct SearchObjective<'a> {
    pub data: FeatureData<'a>,
    pub splitter: &'a dyn SplitFinder,
    pub trend: Option<Trend>,
    pub weights: ScoreWeights,
}

impl SearchObjective<'_> {
    /// Evaluate one candidate drawn from `trial`
    pub fn evaluate(&self, trial: &mut dyn Trial) -> TrialOutcome {
        let max_bins = trial.suggest_int("max_bins", MAX_BINS_RANGE.0, MAX_BINS_RANGE.1) as usize;
        let min_bin_size =
            trial.suggest_float("min_bin_size", MIN_BIN_SIZE_RANGE.0, MIN_BIN_SIZE_RANGE.1);
        let min_event_rate_diff = trial.suggest_float(
            "min_event_rate_diff",
            MIN_EVENT_RATE_DIFF_RANGE.0,
            MIN_EVENT_RATE_DIFF_RANGE.1,
        );
        let params = CandidateParams {
            max_bins,
            min_bin_size,
            min_event_rate_diff,
        };

        let split = SplitParams {
            max_bins,
            min_bin_size,
            trend: self.trend,
        };
        let refine = RefineOptions {
            min_event_rate_diff,
            trend: self.trend,
            check_stability: false,
        };

        let mut outcome = TrialOutcome {
            params,
            score: DEGENERATE_SCORE,
            iv: 0.0,
            separability: 0.0,
            ks: 0.0,
            n_bins: 0,
        };

        match fit_refined(&self.data, self.splitter, &split, &refine) {
            Ok(fitted) => {
                outcome.n_bins = fitted.table.n_bins();
                outcome.iv = information_value(&fitted.table);

                if let Some(periods) = self.data.periods {
                    let codes = fitted.mapping.assign(self.data.values);
                    let (mut kept_codes, mut kept_target, mut kept_periods) =
                        (Vec::new(), Vec::new(), Vec::new());
                    for (i, code) in codes.iter().enumerate() {
                        if let Some(code) = code {
                            kept_codes.push(*code);
                            kept_target.push(self.data.target[i]);
                            kept_periods.push(periods[i].clone());
                        }
                    }

                    outcome.separability = separability_score(
                        &kept_codes,
                        &kept_target,
                        &kept_periods,
                        &SeparabilityOptions::default(),
                    );
                    let observed = observations_table(
                        self.data.variable,
                        &kept_codes,
                        &kept_target,
                        &kept_periods,
                    );
                    outcome.ks = event_rate_by_time(&observed)
                        .map(|pivot| two_sample_distance(&pivot))
                        .unwrap_or(0.0);
                }

                if outcome.n_bins >= 2 {
                    outcome.score =
                        self.weights.score(outcome.separability, outcome.iv, outcome.ks);
                }
            }
            Err(e) => {
                debug!(
                    feature = self.data.variable,
                    trial = trial.number(),
                    error = %e,
                    "trial failed"
                );
            }
        }

        trial.set_user_attr("iv", outcome.iv);
        trial.set_user_attr("separability", outcome.separability);
        trial.set_user_attr("ks", outcome.ks);
        trial.set_user_attr("n_bins", outcome.n_bins as f64);
        trial.set_user_attr("score", outcome.score);
        outcome
    }

    /// Run a random search and return the study with the best candidate
    pub fn search(&self, driver: &RandomSearch) -> (Study, Option<CandidateParams>) {
        let mut outcomes: Vec<TrialOutcome> = Vec::with_capacity(driver.n_trials);
        let study = driver.optimize(|trial| {
            let outcome = self.evaluate(trial);
            outcomes.push(outcome);
            outcome.score
        });

        let best = study
            .best_trial()
            .and_then(|t| outcomes.get(t.number))
            .map(|o| o.params);

        if let Some(best_trial) = study.best_trial() {
            info!(
                feature = self.data.variable,
                trials = study.trials.len(),
                best_trial = best_trial.number,
                best_score = best_trial.score,
                "search finished"
            );
        }

        (study, best)
    }
}
