//! Decision Policy
//!
//! Maps a score to one of three verdicts using two configurable thresholds.
//! Boundaries are inclusive on the more severe side.

use std::fmt;
use serde::{Deserialize, Serialize};

/// Traffic verdict, ordered by severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Allow,
    Reroute,
    Block,
}

impl Verdict {
    pub const ALL: [Verdict; 3] = [Verdict::Allow, Verdict::Reroute, Verdict::Block];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allow => "ALLOW",
            Verdict::Reroute => "REROUTE",
            Verdict::Block => "BLOCK",
        }
    }

    /// Only ALLOW traffic reaches a backend
    pub fn permits_forwarding(&self) -> bool {
        matches!(self, Verdict::Allow)
    }

    /// REROUTE and BLOCK count as bot traffic
    pub fn is_bot(&self) -> bool {
        !self.permits_forwarding()
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold Configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// score >= block -> BLOCK
    pub block: f64,

    /// reroute <= score < block -> REROUTE
    pub reroute: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            block: 0.85,
            reroute: 0.60,
        }
    }
}

impl ThresholdConfig {
    pub fn new(reroute: f64, block: f64) -> Self {
        Self { block, reroute }
    }

    /// Thresholds must be finite and ordered inside [0, 1]
    pub fn is_valid(&self) -> bool {
        self.reroute.is_finite()
            && self.block.is_finite()
            && 0.0 <= self.reroute
            && self.reroute <= self.block
            && self.block <= 1.0
    }

    pub fn decide(&self, score: f64) -> Verdict {
        if score >= self.block {
            Verdict::Block
        } else if score >= self.reroute {
            Verdict::Reroute
        } else {
            Verdict::Allow
        }
    }
}
