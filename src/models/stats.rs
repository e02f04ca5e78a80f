//! Telemetry endpoint models

use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCES_LIMIT: usize = 10;
pub const MAX_SOURCES_LIMIT: usize = 100;

#[derive(Debug, Deserialize, Default)]
pub struct SourcesQuery {
    pub limit: Option<usize>,
}

impl SourcesQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_SOURCES_LIMIT).min(MAX_SOURCES_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub ok: bool,
    pub reset_at: i64,
}
