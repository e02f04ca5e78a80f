//! Model Parameters
//!
//! Versioned artifact produced by the training pipeline:
//! feature order, scaler (mean/scale) and logistic regression weights.

use std::collections::HashSet;
use std::path::Path;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model has no features")]
    Empty,

    #[error("Shape mismatch: {features} features, {mean} mean, {scale} scale, {weights} weights")]
    ShapeMismatch {
        features: usize,
        mean: usize,
        scale: usize,
        weights: usize,
    },

    #[error("Duplicate feature: {0}")]
    DuplicateFeature(String),

    #[error("Scale of feature '{0}' is zero")]
    ZeroScale(String),

    #[error("Non-finite parameter: {0}")]
    NonFinite(String),
}

/// Immutable model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    #[serde(default = "default_version")]
    pub version: String,

    /// Canonical feature order
    pub features: Vec<String>,

    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    pub weights: Vec<f64>,
    pub bias: f64,
}

fn default_version() -> String {
    "unversioned".to_string()
}

impl ModelParams {
    /// Load and validate an artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let params = Self::from_json(&content)?;
        tracing::info!(
            "Loaded model {} ({} features) from {}",
            params.version,
            params.feature_count(),
            path.display()
        );
        Ok(params)
    }

    pub fn from_json(content: &str) -> Result<Self, ModelError> {
        let params: ModelParams = serde_json::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Check the shape and value invariants of the artifact
    pub fn validate(&self) -> Result<(), ModelError> {
        let n = self.features.len();
        if n == 0 {
            return Err(ModelError::Empty);
        }

        if self.mean.len() != n || self.scale.len() != n || self.weights.len() != n {
            return Err(ModelError::ShapeMismatch {
                features: n,
                mean: self.mean.len(),
                scale: self.scale.len(),
                weights: self.weights.len(),
            });
        }

        let mut seen = HashSet::with_capacity(n);
        for name in &self.features {
            if !seen.insert(name.as_str()) {
                return Err(ModelError::DuplicateFeature(name.clone()));
            }
        }

        for (i, name) in self.features.iter().enumerate() {
            if !self.mean[i].is_finite() {
                return Err(ModelError::NonFinite(format!("mean[{}]", name)));
            }
            if !self.scale[i].is_finite() {
                return Err(ModelError::NonFinite(format!("scale[{}]", name)));
            }
            if self.scale[i] == 0.0 {
                return Err(ModelError::ZeroScale(name.clone()));
            }
            if !self.weights[i].is_finite() {
                return Err(ModelError::NonFinite(format!("weights[{}]", name)));
            }
        }

        if !self.bias.is_finite() {
            return Err(ModelError::NonFinite("bias".to_string()));
        }

        Ok(())
    }

    pub fn feature_count(&self) -> usize {
        self.features.len()
    }
}
