//! Error taxonomy for the binning pipeline
//!
//! Schema and configuration errors abort the fit of a single feature and are
//! always attributable to it. Degenerate partitions are normally reported as
//! flags and guard scores rather than raised.

use polars::prelude::PolarsError;
use thiserror::Error;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, BinningError>;

/// Errors raised by the binning pipeline
#[derive(Debug, Error)]
pub enum BinningError {
    /// A required bin table column could not be resolved through the alias table
    #[error("Required column '{column}' not found. Accepted names: {accepted}")]
    Schema {
        column: &'static str,
        accepted: String,
    },

    /// A column resolved but holds values a bin table cannot carry
    #[error("Column '{column}' is invalid: {reason}")]
    InvalidColumn { column: String, reason: String },

    /// Unknown strategy, invalid trend literal, missing time column, bad threshold
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Refinement or split-finding left fewer than 2 usable bins
    #[error("Feature '{feature}' collapsed to {bins} bin(s)")]
    DegenerateResult { feature: String, bins: usize },

    /// The upstream split finder (MIP solver) failed
    #[error("Split finder failed for '{feature}': {message}")]
    Solver { feature: String, message: String },

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl BinningError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        BinningError::InvalidConfiguration(message.into())
    }
}
