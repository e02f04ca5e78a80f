//! Forwarder
//!
//! Best-effort dispatch of ALLOW traffic to the chosen backend.
//! Every failure (connect, timeout, non-2xx) becomes a `ForwardOutcome`;
//! nothing here is returned as an error to the decision path. No retries.

use std::time::{Duration, Instant};
use serde::Serialize;
use serde_json::Value;

use super::selector::Backend;
use crate::model::Flow;
use crate::telemetry::ForwardOutcome;

/// Header carrying the shared secret backends authenticate the edge with
pub const SECRET_HEADER: &str = "x-edge-secret";

/// Body posted to the backend
#[derive(Debug, Serialize)]
pub struct ForwardPayload<'a> {
    pub flow: &'a Flow,
    pub meta: Option<&'a Value>,
    pub attack_score: f64,
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    http_client: reqwest::Client,
    shared_secret: String,
}

impl Forwarder {
    /// Build a forwarder whose every request is bounded by `timeout`
    pub fn new(timeout: Duration, shared_secret: impl Into<String>) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            shared_secret: shared_secret.into(),
        })
    }

    pub async fn forward(&self, backend: &Backend, payload: &ForwardPayload<'_>) -> ForwardOutcome {
        let started = Instant::now();

        let result = self
            .http_client
            .post(&backend.url)
            .header(SECRET_HEADER, &self.shared_secret)
            .json(payload)
            .send()
            .await;

        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                let outcome = ForwardOutcome::responded(response.status().as_u16(), latency_ms);
                if outcome.ok {
                    tracing::debug!("Forwarded to {} ({}) in {}ms", backend.id, response.status(), latency_ms);
                } else {
                    tracing::warn!("Backend {} responded {}", backend.id, response.status());
                }
                outcome
            }
            Err(e) => {
                let reason = if e.is_timeout() {
                    "timeout".to_string()
                } else if e.is_connect() {
                    format!("connect: {}", e)
                } else {
                    e.to_string()
                };
                tracing::warn!("Forward to {} failed: {}", backend.id, reason);
                ForwardOutcome::unreachable(reason, latency_ms)
            }
        }
    }
}
