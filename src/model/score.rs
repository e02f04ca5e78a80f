//! Score Engine
//!
//! Logistic regression over the normalized flow: `sigmoid(bias + w . x)`.

use super::normalizer::{normalize, Flow, FlowError};
use super::params::ModelParams;

/// Numerically stable logistic function
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `bias + sum(weights[i] * x[i])`
pub fn linear(x: &[f64], weights: &[f64], bias: f64) -> f64 {
    x.iter().zip(weights).fold(bias, |z, (x, w)| z + w * x)
}

/// Scores flows against one immutable parameter set
#[derive(Debug, Clone)]
pub struct ScoreEngine {
    params: ModelParams,
}

impl ScoreEngine {
    pub fn new(params: ModelParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    /// Normalize and score a raw flow
    pub fn score(&self, flow: &Flow) -> Result<f64, FlowError> {
        let x = normalize(flow, &self.params)?;
        let z = linear(&x, &self.params.weights, self.params.bias);

        // +inf and -inf terms cancelling out
        if z.is_nan() {
            return Err(FlowError::NumericOverflow);
        }

        Ok(sigmoid(z))
    }
}
