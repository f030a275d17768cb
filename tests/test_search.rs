//! Tests for the hyperparameter search objective and driver

mod common;

use common::perfect_separator;
use nasabin::pipeline::strategies::SupervisedSplitter;
use nasabin::pipeline::{
    FeatureData, FeatureValues, FixedTrial, PrebinMethod, RandomSearch, ScoreWeights,
    SearchObjective, Trial, DEGENERATE_SCORE,
};

fn fixed(max_bins: f64, min_bin_size: f64, min_event_rate_diff: f64) -> FixedTrial {
    FixedTrial::new([
        ("max_bins".to_string(), max_bins),
        ("min_bin_size".to_string(), min_bin_size),
        ("min_event_rate_diff".to_string(), min_event_rate_diff),
    ])
}

fn candidates() -> Vec<FixedTrial> {
    vec![
        fixed(3.0, 0.01, 0.01),
        fixed(5.0, 0.05, 0.05),
        fixed(10.0, 0.1, 0.1),
        fixed(7.0, 0.02, 0.08),
    ]
}

#[test]
fn test_perfect_separator_is_never_degenerate() {
    let (raw, target, periods) = perfect_separator();
    let values = FeatureValues::Numeric(raw);
    let splitter = SupervisedSplitter::new(20, PrebinMethod::Quantile);
    let objective = SearchObjective {
        data: FeatureData {
            variable: "x",
            values: &values,
            target: &target,
            periods: Some(&periods),
        },
        splitter: &splitter,
        trend: None,
        weights: ScoreWeights::default(),
    };

    let mut scores = Vec::new();
    for mut trial in candidates() {
        let outcome = objective.evaluate(&mut trial);
        assert_eq!(outcome.n_bins, 2);
        assert_ne!(outcome.score, DEGENERATE_SCORE);
        assert!((outcome.separability - 1.0).abs() < 1e-12);
        assert_eq!(outcome.ks, 0.0);
        assert!(outcome.iv > 1.0);
        assert_eq!(trial.user_attrs()["n_bins"], 2.0);
        assert_eq!(trial.user_attrs()["score"], outcome.score);
        scores.push(outcome.score);
    }

    // every candidate gives the same partition, hence the same best score
    let best = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    assert!(scores.iter().all(|s| (s - best).abs() < 1e-9));

    let (study, params) = objective.search(&RandomSearch {
        n_trials: 6,
        seed: 3,
    });
    let best_trial = study.best_trial().unwrap();
    assert!((best_trial.score - best).abs() < 1e-9);
    assert_eq!(best_trial.number, 0);
    assert!(params.is_some());
    assert!(study.trials.iter().all(|t| t.score != DEGENERATE_SCORE));
}

#[test]
fn test_perfect_separator_beats_a_noisy_feature() {
    let (_, target, periods) = perfect_separator();
    // agrees with the target on 70% of rows
    let noisy: Vec<Option<f64>> = target
        .iter()
        .enumerate()
        .map(|(i, y)| {
            let flip = i % 10 < 3;
            Some(if flip { f64::from(1 - y) } else { f64::from(*y) })
        })
        .collect();
    let (raw, _, _) = perfect_separator();
    let splitter = SupervisedSplitter::new(20, PrebinMethod::Quantile);

    let score_of = |values: &FeatureValues| {
        let objective = SearchObjective {
            data: FeatureData {
                variable: "x",
                values,
                target: &target,
                periods: Some(&periods),
            },
            splitter: &splitter,
            trend: None,
            weights: ScoreWeights::default(),
        };
        objective.evaluate(&mut fixed(5.0, 0.05, 0.02)).score
    };

    let perfect = score_of(&FeatureValues::Numeric(raw));
    let weaker = score_of(&FeatureValues::Numeric(noisy));
    assert!(perfect > weaker);
}

#[test]
fn test_constant_feature_hits_degenerate_guard() {
    let (_, target, periods) = perfect_separator();
    let values = FeatureValues::Numeric(vec![Some(1.0); target.len()]);
    let splitter = SupervisedSplitter::new(20, PrebinMethod::Quantile);
    let objective = SearchObjective {
        data: FeatureData {
            variable: "flat",
            values: &values,
            target: &target,
            periods: Some(&periods),
        },
        splitter: &splitter,
        trend: None,
        weights: ScoreWeights::default(),
    };

    let outcome = objective.evaluate(&mut fixed(5.0, 0.05, 0.02));
    assert_eq!(outcome.n_bins, 1);
    assert_eq!(outcome.score, DEGENERATE_SCORE);
}

#[test]
fn test_random_search_is_seeded() {
    let run = |seed| {
        RandomSearch { n_trials: 5, seed }.optimize(|trial: &mut dyn Trial| {
            let a = trial.suggest_float("a", 0.0, 1.0);
            let b = trial.suggest_int("b", 1, 4) as f64;
            a * b
        })
    };
    assert_eq!(run(11), run(11));
    assert_ne!(run(11), run(12));

    let study = run(11);
    assert_eq!(study.trials.len(), 5);
    let best = study.best_trial().unwrap();
    assert!(study.trials.iter().all(|t| t.score <= best.score));
}

#[test]
fn test_best_trial_keeps_earliest_tie() {
    let study = RandomSearch {
        n_trials: 4,
        seed: 1,
    }
    .optimize(|_trial: &mut dyn Trial| 1.0);
    assert_eq!(study.best_trial().unwrap().number, 0);
}

#[test]
fn test_fixed_trial_clamps_to_range() {
    let mut trial = fixed(40.0, 0.0, 0.05);
    assert_eq!(trial.suggest_int("max_bins", 3, 10), 10);
    assert_eq!(trial.suggest_float("min_bin_size", 0.01, 0.1), 0.01);
    assert_eq!(trial.suggest_float("min_event_rate_diff", 0.01, 0.1), 0.05);
    assert_eq!(trial.suggest_float("unknown", 0.2, 0.3), 0.2);
}
