//! Pipeline module - bin tables, refinement, metrics and the orchestrator

pub mod bin_table;
pub mod binner;
pub mod compare;
pub mod features;
pub mod iv;
pub mod loader;
pub mod refinement;
pub mod search;
pub mod solver;
pub mod stability;
pub mod strategies;
pub mod target;

pub use bin_table::{BinAggregate, BinRow, BinTable, Period, TableAttrs};
pub use binner::*;
pub use compare::*;
pub use features::{FeatureKind, FeatureValues};
pub use iv::*;
pub use loader::*;
pub use refinement::*;
pub use search::*;
pub use solver::{SolverConfig, Trend};
pub use stability::*;
pub use strategies::{
    splitter_for, BinMapping, Encoding, Partition, PrebinMethod, SplitFinder, SplitParams,
    SplitterSettings, Strategy, UnsupervisedMethod,
};
pub use target::*;
