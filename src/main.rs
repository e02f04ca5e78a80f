//! Edge Gateway
//!
//! Classifies inbound flows, forwards allowed traffic to a backend pool
//! and keeps a live, windowed view of every decision.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       EDGE GATEWAY                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  POST /api/edge                                             │
//! │     │                                                       │
//! │     ▼                                                       │
//! │  ┌────────────┐  ┌────────────┐  ┌──────────┐               │
//! │  │ Normalizer │─▶│   Score    │─▶│  Policy  │──┐            │
//! │  └────────────┘  └────────────┘  └──────────┘  │ ALLOW      │
//! │                                                ▼            │
//! │                      ┌──────────┐  ┌───────────────┐        │
//! │                      │ Selector │─▶│   Forwarder   │──▶ pool │
//! │                      └──────────┘  └───────────────┘        │
//! │                                                             │
//! │  every outcome ──▶ TelemetryStore ◀── GET /api/stats        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod handlers;
mod middleware;
mod model;
mod models;
mod pipeline;
mod routing;
mod telemetry;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
    middleware as axum_middleware,
};
use tower_http::{
    cors::{CorsLayer, Any},
    trace::TraceLayer,
    compression::CompressionLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use error::{AppError, AppResult};

use model::{ModelParams, ScoreEngine};
use pipeline::EdgePipeline;
use routing::{BackendSelector, Forwarder};
use telemetry::TelemetryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before the filter reads RUST_LOG
    dotenvy::dotenv().ok();

    init_tracing();

    let config = config::Config::from_env().context("Invalid configuration")?;

    tracing::info!("Edge Gateway starting ({})...", if config.is_production() { "production" } else { "development" });
    tracing::info!(
        "Backends: {} ({}), thresholds: reroute={} block={}, secret: {}",
        config.backends.len(),
        config.strategy,
        config.thresholds.reroute,
        config.thresholds.block,
        if config.has_secret() { "set" } else { "unset" }
    );

    let params = ModelParams::load(&config.model_path)
        .with_context(|| format!("Failed to load model from {}", config.model_path))?;

    let state = AppState::build(config.clone(), params).context("Failed to build application state")?;

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Edge Gateway stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "edge_gateway=debug,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EdgePipeline>,
    pub config: config::Config,

    /// SHA-256 of ADMIN_TOKEN
    pub admin_token_hash: Option<String>,
}

impl AppState {
    pub fn build(config: config::Config, params: ModelParams) -> Result<Self, reqwest::Error> {
        let backend_ids = config.backends.iter().map(|b| b.id.clone()).collect();
        let telemetry = Arc::new(TelemetryStore::with_backends(config.store_config(), backend_ids));

        let forwarder = Forwarder::new(config.forward_timeout, config.shared_secret.clone())?;
        let selector = BackendSelector::new(config.backends.clone(), config.strategy);

        let pipeline = EdgePipeline::new(
            ScoreEngine::new(params),
            config.thresholds,
            selector,
            forwarder,
            telemetry,
        );

        Ok(Self {
            pipeline: Arc::new(pipeline),
            admin_token_hash: config.admin_token.as_deref().map(middleware::auth::hash_token),
            config,
        })
    }
}

/// Create the main router with all routes
fn create_router(state: AppState) -> Router {
    // Public routes
    let public_routes = Router::new()
        .route("/health", get(handlers::health::check))
        .route("/api/edge", get(handlers::edge::info).post(handlers::edge::decide))
        .route("/api/stats", get(handlers::stats::snapshot))
        .route("/api/stats/summary", get(handlers::stats::summary))
        .route("/api/stats/sources", get(handlers::stats::sources));

    // Admin routes (bearer token when ADMIN_TOKEN is set)
    let admin_routes = Router::new()
        .route("/api/stats/reset", post(handlers::stats::reset))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin_auth
        ));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        )
        .with_state(state)
}
