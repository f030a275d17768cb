//! Terminal helpers shared by the CLI and the orchestrator

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
