//! Edge decision handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};

use crate::{AppState, AppError, AppResult};
use crate::models::{EdgeInfo, EdgeRequest, EdgeResponse};
use crate::telemetry::RequestMeta;

/// Describe the decision endpoint
pub async fn info(State(state): State<AppState>) -> Json<EdgeInfo> {
    let params = state.pipeline.engine().params();
    Json(EdgeInfo {
        ok: true,
        message: "POST { flow: {...}, meta: {...} } to get attack_score + decision + chosen_backend",
        feature_order: params.features.clone(),
        model_version: params.version.clone(),
        backends_loaded: state.pipeline.selector().len(),
        has_secret: state.config.has_secret(),
        strategy: state.pipeline.selector().strategy().to_string(),
    })
}

/// Score a flow and dispatch it
pub async fn decide(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<EdgeRequest>, JsonRejection>,
) -> AppResult<Json<EdgeResponse>> {
    let Json(req) = payload.map_err(|rejection| {
        tracing::debug!("Rejected edge request body: {}", rejection.body_text());
        AppError::from(rejection)
    })?;

    // First hop of X-Forwarded-For when meta carries no source address
    let forwarded_for = headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or(s).trim().to_string());

    let meta = RequestMeta::from_value(req.meta.as_ref()).with_fallback_src_ip(forwarded_for);

    let event = state
        .pipeline
        .process(&req.flow, req.meta.as_ref(), meta)
        .await
        .map_err(|e| {
            tracing::debug!("Rejected flow: {}", e);
            AppError::from(e)
        })?;

    Ok(Json(EdgeResponse {
        attack_score: event.attack_score,
        decision: event.decision,
        render_status: event.forward.as_ref().and_then(|f| f.status),
        chosen_backend: event.chosen_backend,
        forward: event.forward,
        backends_loaded: state.pipeline.selector().len(),
        has_secret: state.config.has_secret(),
    }))
}
