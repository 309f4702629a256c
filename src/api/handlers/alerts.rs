//! Alert handlers, scoped to the calling user.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch};
use axum::{Json, Router};

use crate::api::auth::UserId;
use crate::api::dto::{AlertListResponse, CreateAlertRequest, UpdateAlertRequest};
use crate::app_state::AppState;
use crate::domain::{Alert, AlertId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /alerts` — List the caller's alerts.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a user header, or a
/// store error.
#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    tag = "Alerts",
    summary = "List alerts",
    params(("x-user-id" = String, Header, description = "Authenticated user ID")),
    responses(
        (status = 200, description = "The caller's alerts", body = AlertListResponse),
        (status = 401, description = "Missing user", body = ErrorResponse),
    )
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    user: UserId,
) -> Result<impl IntoResponse, GatewayError> {
    let data = state.alert_service.list_alerts(user.as_str()).await?;
    Ok(Json(AlertListResponse {
        count: data.len(),
        data,
    }))
}

/// `POST /alerts` — Create an alert.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed alert.
#[utoipa::path(
    post,
    path = "/api/v1/alerts",
    tag = "Alerts",
    summary = "Create alert",
    description = "Creates an armed alert that fires when the live APR crosses the threshold (inclusive), at most once per cooldown.",
    params(("x-user-id" = String, Header, description = "Authenticated user ID")),
    request_body = CreateAlertRequest,
    responses(
        (status = 201, description = "Alert created", body = Alert),
        (status = 400, description = "Invalid alert", body = ErrorResponse),
        (status = 401, description = "Missing user", body = ErrorResponse),
    )
)]
pub async fn create_alert(
    State(state): State<AppState>,
    user: UserId,
    Json(req): Json<CreateAlertRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let alert = state
        .alert_service
        .create_alert(user.as_str(), &req.asset, &req.platform, req.alert_type, req.threshold)
        .await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

/// `PATCH /alerts/{id}` — Arm or disarm an alert.
///
/// # Errors
///
/// Returns [`GatewayError::AlertNotFound`] if the alert is not the caller's.
#[utoipa::path(
    patch,
    path = "/api/v1/alerts/{id}",
    tag = "Alerts",
    summary = "Toggle alert",
    params(
        ("id" = uuid::Uuid, Path, description = "Alert UUID"),
        ("x-user-id" = String, Header, description = "Authenticated user ID"),
    ),
    request_body = UpdateAlertRequest,
    responses(
        (status = 200, description = "Updated alert", body = Alert),
        (status = 404, description = "Alert not found", body = ErrorResponse),
    )
)]
pub async fn update_alert(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateAlertRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let alert = state
        .alert_service
        .set_active(AlertId::from_uuid(id), user.as_str(), req.is_active)
        .await?;
    Ok(Json(alert))
}

/// `DELETE /alerts/{id}` — Delete an alert. Its notifications are kept.
///
/// # Errors
///
/// Returns [`GatewayError::AlertNotFound`] if the alert is not the caller's.
#[utoipa::path(
    delete,
    path = "/api/v1/alerts/{id}",
    tag = "Alerts",
    summary = "Delete alert",
    params(
        ("id" = uuid::Uuid, Path, description = "Alert UUID"),
        ("x-user-id" = String, Header, description = "Authenticated user ID"),
    ),
    responses(
        (status = 204, description = "Alert deleted"),
        (status = 404, description = "Alert not found", body = ErrorResponse),
    )
)]
pub async fn delete_alert(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .alert_service
        .delete_alert(AlertId::from_uuid(id), user.as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Alert routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts).post(create_alert))
        .route("/alerts/{id}", patch(update_alert).delete(delete_alert))
}
