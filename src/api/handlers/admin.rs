//! Admin handlers: manual sync, alert evaluation, scheduler control.
//!
//! Every route requires the cron secret (see [`CronAuth`]).

use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::auth::CronAuth;
use crate::api::dto::{EvaluateResponse, SchedulerActionResponse, StartSchedulerRequest, SyncResponse};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};
use crate::service::SchedulerStatus;

/// `POST /admin/sync` — Run one sync cycle now.
#[utoipa::path(
    post,
    path = "/api/v1/admin/sync",
    tag = "Admin",
    summary = "Run a sync cycle",
    description = "Runs fetch, snapshot save, history append and alert evaluation. Returns `skipped` if a cycle is already in flight.",
    params(("Authorization" = String, Header, description = "Bearer <cron secret>")),
    responses(
        (status = 200, description = "Cycle outcome", body = SyncResponse),
        (status = 401, description = "Bad or missing secret", body = ErrorResponse),
    )
)]
pub async fn run_sync(_auth: CronAuth, State(state): State<AppState>) -> impl IntoResponse {
    Json(SyncResponse::from(state.sync_service().run_sync_cycle().await))
}

/// `POST /admin/alerts/evaluate` — Evaluate alerts against live rates.
///
/// # Errors
///
/// Returns a store error if active alerts cannot be read.
#[utoipa::path(
    post,
    path = "/api/v1/admin/alerts/evaluate",
    tag = "Admin",
    summary = "Evaluate alerts",
    params(("Authorization" = String, Header, description = "Bearer <cron secret>")),
    responses(
        (status = 200, description = "Notifications produced", body = EvaluateResponse),
        (status = 401, description = "Bad or missing secret", body = ErrorResponse),
    )
)]
pub async fn evaluate_alerts(
    _auth: CronAuth,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let data = state.sync_service().evaluate_alerts_now().await?;
    Ok(Json(EvaluateResponse {
        count: data.len(),
        data,
    }))
}

/// `GET /admin/scheduler` — Scheduler state.
#[utoipa::path(
    get,
    path = "/api/v1/admin/scheduler",
    tag = "Admin",
    summary = "Scheduler status",
    params(("Authorization" = String, Header, description = "Bearer <cron secret>")),
    responses(
        (status = 200, description = "Scheduler state", body = SchedulerStatus),
        (status = 401, description = "Bad or missing secret", body = ErrorResponse),
    )
)]
pub async fn scheduler_status(_auth: CronAuth, State(state): State<AppState>) -> impl IntoResponse {
    Json(state.scheduler.status().await)
}

/// `POST /admin/scheduler/start` — Start the sync timer.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a zero interval.
#[utoipa::path(
    post,
    path = "/api/v1/admin/scheduler/start",
    tag = "Admin",
    summary = "Start scheduler",
    description = "Starts the timer; the first cycle runs immediately. A no-op if already running.",
    params(("Authorization" = String, Header, description = "Bearer <cron secret>")),
    request_body(content = StartSchedulerRequest, description = "Optional interval override"),
    responses(
        (status = 200, description = "Scheduler state", body = SchedulerActionResponse),
        (status = 400, description = "Invalid interval", body = ErrorResponse),
        (status = 401, description = "Bad or missing secret", body = ErrorResponse),
    )
)]
pub async fn start_scheduler(
    _auth: CronAuth,
    State(state): State<AppState>,
    body: Option<Json<StartSchedulerRequest>>,
) -> Result<impl IntoResponse, GatewayError> {
    let interval = match body.and_then(|Json(req)| req.interval_secs) {
        Some(0) => {
            return Err(GatewayError::InvalidRequest(
                "interval_secs must be positive".to_string(),
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => state.sync_interval,
    };
    let changed = state.scheduler.start(interval).await;
    Ok(Json(SchedulerActionResponse {
        changed,
        status: state.scheduler.status().await,
    }))
}

/// `POST /admin/scheduler/stop` — Stop the sync timer.
#[utoipa::path(
    post,
    path = "/api/v1/admin/scheduler/stop",
    tag = "Admin",
    summary = "Stop scheduler",
    description = "Stops the timer. A cycle already running completes. A no-op if not running.",
    params(("Authorization" = String, Header, description = "Bearer <cron secret>")),
    responses(
        (status = 200, description = "Scheduler state", body = SchedulerActionResponse),
        (status = 401, description = "Bad or missing secret", body = ErrorResponse),
    )
)]
pub async fn stop_scheduler(_auth: CronAuth, State(state): State<AppState>) -> impl IntoResponse {
    let changed = state.scheduler.stop().await;
    Json(SchedulerActionResponse {
        changed,
        status: state.scheduler.status().await,
    })
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/sync", post(run_sync))
        .route("/admin/alerts/evaluate", post(evaluate_alerts))
        .route("/admin/scheduler", get(scheduler_status))
        .route("/admin/scheduler/start", post(start_scheduler))
        .route("/admin/scheduler/stop", post(stop_scheduler))
}
