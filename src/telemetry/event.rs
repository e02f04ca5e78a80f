//! Decision Event
//!
//! One record per processed flow. Created once, never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::model::Verdict;

/// Optional request metadata. Each field may be absent independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMeta {
    pub src_ip: Option<String>,
    pub path: Option<String>,
    pub ua: Option<String>,
}

/// Non-empty trimmed string, or None
fn pick_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl RequestMeta {
    /// Extract known fields from a raw `meta` object; unknown fields are ignored
    pub fn from_value(meta: Option<&Value>) -> Self {
        let field = |name: &str| pick_str(meta.and_then(|m| m.get(name)));
        Self {
            src_ip: field("src_ip"),
            path: field("path"),
            ua: field("ua"),
        }
    }

    /// Use `fallback` as source address when none was supplied
    pub fn with_fallback_src_ip(mut self, fallback: Option<String>) -> Self {
        if self.src_ip.is_none() {
            self.src_ip = fallback.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        }
        self
    }
}

/// Result of forwarding a flow to its backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardOutcome {
    /// Backend answered at all
    pub reachable: bool,

    /// Backend answered 2xx
    pub ok: bool,

    pub status: Option<u16>,
    pub error: Option<String>,
    pub latency_ms: u64,
}

impl ForwardOutcome {
    pub fn responded(status: u16, latency_ms: u64) -> Self {
        let ok = (200..300).contains(&status);
        Self {
            reachable: true,
            ok,
            status: Some(status),
            error: (!ok).then(|| format!("Backend responded {}", status)),
            latency_ms,
        }
    }

    pub fn unreachable(error: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            reachable: false,
            ok: false,
            status: None,
            error: Some(error.into()),
            latency_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionEvent {
    pub id: Uuid,
    pub ts: DateTime<Utc>,
    pub attack_score: f64,
    pub decision: Verdict,

    /// Only set when the verdict permits forwarding
    pub chosen_backend: Option<String>,

    #[serde(flatten)]
    pub meta: RequestMeta,

    pub forward: Option<ForwardOutcome>,
}

impl DecisionEvent {
    pub fn new(attack_score: f64, decision: Verdict) -> Self {
        Self::at(Utc::now(), attack_score, decision)
    }

    pub fn at(ts: DateTime<Utc>, attack_score: f64, decision: Verdict) -> Self {
        Self {
            id: Uuid::new_v4(),
            ts,
            attack_score,
            decision,
            chosen_backend: None,
            meta: RequestMeta::default(),
            forward: None,
        }
    }

    pub fn with_meta(mut self, meta: RequestMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.chosen_backend = Some(backend.into());
        self
    }

    pub fn with_forward(mut self, outcome: ForwardOutcome) -> Self {
        self.forward = Some(outcome);
        self
    }

    /// Truncated epoch second (bucket key)
    pub fn epoch_second(&self) -> i64 {
        self.ts.timestamp()
    }
}
