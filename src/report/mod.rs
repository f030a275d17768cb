//! Report module - terminal summary of fitted bins

pub mod summary;

pub use summary::*;
