//! System endpoints: health check and source catalogue.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
    /// Store backend in use (`postgres` or `memory`).
    store: String,
    store_healthy: bool,
    scheduler_running: bool,
}

/// `GET /health` — Service health status.
///
/// Always answers 200; a failing store is reported as `degraded`.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health, version, store backend and scheduler state.",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    )
)]
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.store.is_healthy().await;
    let status = if store_healthy { "healthy" } else { "degraded" };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            store: state.store.backend().to_string(),
            store_healthy,
            scheduler_running: state.scheduler.is_running().await,
        }),
    )
}

/// Configured source catalogue.
#[derive(Debug, Serialize, ToSchema)]
pub struct SourcesResponse {
    count: usize,
    sources: Vec<String>,
}

/// `GET /config/sources` — Names of the configured yield sources.
#[utoipa::path(
    get,
    path = "/config/sources",
    tag = "System",
    summary = "List configured sources",
    responses(
        (status = 200, description = "Source names", body = SourcesResponse),
    )
)]
pub async fn sources_handler(State(state): State<AppState>) -> impl IntoResponse {
    let sources = state.registry.source_names();
    Json(SourcesResponse {
        count: sources.len(),
        sources,
    })
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/sources", get(sources_handler))
}
