//! nasabin: credit-risk binning library
//!
//! Bins the features of a dataset against a binary target, refines adjacent
//! bins by minimum event-rate difference and monotonic trend, and scores the
//! partitions by information value and by how stable their event rates are
//! across time periods.

pub mod cli;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod utils;

pub use error::{BinningError, Result};
