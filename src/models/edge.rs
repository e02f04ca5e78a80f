//! Edge decision request/response

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Flow, Verdict};
use crate::telemetry::ForwardOutcome;

#[derive(Debug, Deserialize)]
pub struct EdgeRequest {
    /// Missing flow is reported as a missing feature, not a parse error
    #[serde(default)]
    pub flow: Flow,

    #[serde(default)]
    pub meta: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct EdgeResponse {
    pub attack_score: f64,
    pub decision: Verdict,
    pub chosen_backend: Option<String>,

    /// Backend HTTP status, if one answered
    pub render_status: Option<u16>,
    pub forward: Option<ForwardOutcome>,

    pub backends_loaded: usize,
    pub has_secret: bool,
}

#[derive(Debug, Serialize)]
pub struct EdgeInfo {
    pub ok: bool,
    pub message: &'static str,
    pub feature_order: Vec<String>,
    pub model_version: String,
    pub backends_loaded: usize,
    pub has_secret: bool,
    pub strategy: String,
}
