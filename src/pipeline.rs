//! Decision-and-dispatch path
//!
//! ```text
//! flow ─▶ Normalizer ─▶ Score Engine ─▶ Decision Policy ─┬─▶ (ALLOW) Selector ─▶ Forwarder
//!                                                         └─────────────────────────────┴─▶ TelemetryStore
//! ```
//!
//! Only input errors leave this module as errors. Those flows are never recorded.
//! An empty pool or a failed forward is visible in the recorded event only.

use std::sync::Arc;
use serde_json::Value;

use crate::model::{Flow, FlowError, ScoreEngine, ThresholdConfig};
use crate::routing::{BackendSelector, ForwardPayload, Forwarder};
use crate::telemetry::{DecisionEvent, RequestMeta, TelemetryStore};

pub struct EdgePipeline {
    engine: ScoreEngine,
    policy: ThresholdConfig,
    selector: BackendSelector,
    forwarder: Forwarder,
    telemetry: Arc<TelemetryStore>,
}

impl EdgePipeline {
    pub fn new(
        engine: ScoreEngine,
        policy: ThresholdConfig,
        selector: BackendSelector,
        forwarder: Forwarder,
        telemetry: Arc<TelemetryStore>,
    ) -> Self {
        Self {
            engine,
            policy,
            selector,
            forwarder,
            telemetry,
        }
    }

    pub fn engine(&self) -> &ScoreEngine {
        &self.engine
    }

    pub fn selector(&self) -> &BackendSelector {
        &self.selector
    }

    pub fn telemetry(&self) -> &Arc<TelemetryStore> {
        &self.telemetry
    }

    /// Classify one flow, forward it if allowed, record the outcome
    pub async fn process(
        &self,
        flow: &Flow,
        raw_meta: Option<&Value>,
        meta: RequestMeta,
    ) -> Result<DecisionEvent, FlowError> {
        let attack_score = self.engine.score(flow)?;
        let decision = self.policy.decide(attack_score);

        let mut event = DecisionEvent::new(attack_score, decision);

        if decision.permits_forwarding() {
            match self.selector.select(meta.src_ip.as_deref()) {
                Ok(backend) => {
                    let payload = ForwardPayload {
                        flow,
                        meta: raw_meta,
                        attack_score,
                    };
                    let outcome = self.forwarder.forward(backend, &payload).await;
                    event = event.with_backend(backend.id.clone()).with_forward(outcome);
                }
                Err(e) => {
                    tracing::debug!("Not forwarding ALLOW flow: {}", e);
                }
            }
        }

        let event = event.with_meta(meta);
        tracing::debug!(
            "Decision {} score={:.4} backend={:?}",
            event.decision,
            event.attack_score,
            event.chosen_backend
        );

        self.telemetry.record(event.clone());
        Ok(event)
    }
}
