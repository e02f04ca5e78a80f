//! Wire models

pub mod edge;
pub mod stats;

pub use edge::*;
pub use stats::*;
