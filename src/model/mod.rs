//! Model Module - Flow classifier
//!
//! Normalize a raw flow, score it with the linear model, map the score to a verdict.
//! Parameters come from a read-only artifact loaded once at startup.

pub mod params;
pub mod normalizer;
pub mod score;
pub mod threshold;

// Re-export common types
pub use params::ModelParams;
pub use normalizer::{Flow, FlowError};
pub use score::ScoreEngine;
pub use threshold::{ThresholdConfig, Verdict};
