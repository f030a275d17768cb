//! Tests for fitting several configurations side by side

mod common;

use common::credit_frame;
use nasabin::pipeline::{compare, BinnerConfig, Strategy, UnsupervisedMethod};
use nasabin::BinningError;
use polars::prelude::*;

fn configs() -> Vec<(String, BinnerConfig)> {
    vec![
        ("supervised".to_string(), BinnerConfig::default()),
        (
            "uniform".to_string(),
            BinnerConfig {
                strategy: Strategy::Unsupervised {
                    method: UnsupervisedMethod::Uniform,
                    n_bins: 5,
                },
                check_stability: true,
                ..Default::default()
            },
        ),
    ]
}

#[test]
fn test_compare_fits_each_configuration() {
    let df = credit_frame(3000, 37);
    let comparison = compare(&df, "default", Some("month"), configs()).unwrap();

    let names: Vec<&str> = comparison.rows().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["supervised", "uniform"]);

    for row in comparison.rows() {
        assert_eq!(row.fitted.time_col(), Some("month"));
        assert!((row.total_iv - row.fitted.total_iv()).abs() < 1e-12);
        let bins: usize = row.fitted.features().iter().map(|f| f.n_bins()).sum();
        assert_eq!(row.n_bins, bins);
        assert_eq!(row.failures, 0);
    }

    // drift is only annotated when stability checks are on
    assert!(comparison.get("supervised").unwrap().distribution_shift.is_none());
    let uniform = comparison.get("uniform").unwrap();
    assert!(matches!(uniform.strategy, Strategy::Unsupervised { .. }));
    assert!(uniform.distribution_shift.unwrap() >= 0.0);
}

#[test]
fn test_comparison_frame() {
    let df = credit_frame(2000, 41);
    let comparison = compare(&df, "default", Some("month"), configs()).unwrap();
    let frame = comparison.to_frame().unwrap();

    assert_eq!(frame.shape(), (2, 5));
    assert_eq!(
        frame.get_column_names(),
        &["name", "strategy", "iv", "n_bins", "distribution_shift"]
    );
    assert_eq!(frame.column("distribution_shift").unwrap().null_count(), 1);
    assert_eq!(
        frame.column("strategy").unwrap().str().unwrap().get(0),
        Some("supervised")
    );
}

#[test]
fn test_invalid_configuration_names_the_entry() {
    let df = credit_frame(500, 43);
    let bad = BinnerConfig {
        max_bins: 1,
        ..Default::default()
    };
    let err = compare(
        &df,
        "default",
        None,
        vec![
            ("ok".to_string(), BinnerConfig::default()),
            ("tiny".to_string(), bad),
        ],
    )
    .unwrap_err();
    match err {
        BinningError::InvalidConfiguration(message) => assert!(message.starts_with("tiny:")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_names_rejected() {
    let df = credit_frame(500, 47);
    let configs = vec![
        ("same".to_string(), BinnerConfig::default()),
        ("same".to_string(), BinnerConfig::default()),
    ];
    assert!(matches!(
        compare(&df, "default", None, configs),
        Err(BinningError::InvalidConfiguration(_))
    ));
}
