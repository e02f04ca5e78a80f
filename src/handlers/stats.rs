//! Telemetry handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};

use crate::AppState;
use crate::models::{ResetResponse, SourcesQuery};
use crate::telemetry::{SourceRow, TrafficSummary};

/// Current telemetry snapshot
pub async fn snapshot(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.pipeline.telemetry().snapshot();
    ([(header::CACHE_CONTROL, "no-store")], Json(snapshot))
}

pub async fn summary(State(state): State<AppState>) -> Json<TrafficSummary> {
    Json(state.pipeline.telemetry().summary())
}

/// Most active source addresses among recent events
pub async fn sources(
    State(state): State<AppState>,
    Query(query): Query<SourcesQuery>,
) -> Json<Vec<SourceRow>> {
    Json(state.pipeline.telemetry().top_sources(query.limit()))
}

/// Administrative reset
pub async fn reset(State(state): State<AppState>) -> Json<ResetResponse> {
    state.pipeline.telemetry().reset();
    Json(ResetResponse {
        ok: true,
        reset_at: chrono::Utc::now().timestamp(),
    })
}
