//! Notification inbox handlers, scoped to the calling user.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, patch, post};
use axum::{Json, Router};

use crate::api::auth::UserId;
use crate::api::dto::{
    MarkAllReadResponse, NotificationListResponse, NotificationParams, UpdateNotificationRequest,
};
use crate::app_state::AppState;
use crate::domain::{Notification, NotificationId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /notifications` — List the caller's notifications.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without a user header, or a
/// store error.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "Notifications",
    summary = "List notifications",
    params(
        NotificationParams,
        ("x-user-id" = String, Header, description = "Authenticated user ID"),
    ),
    responses(
        (status = 200, description = "Notifications, newest first", body = NotificationListResponse),
        (status = 401, description = "Missing user", body = ErrorResponse),
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    user: UserId,
    Query(params): Query<NotificationParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let data = state
        .notification_service
        .list(user.as_str(), params.unread_only)
        .await?;
    Ok(Json(NotificationListResponse {
        count: data.len(),
        unread: data.iter().filter(|n| !n.read).count(),
        data,
    }))
}

/// `PATCH /notifications/{id}` — Set the read flag.
///
/// # Errors
///
/// Returns [`GatewayError::NotificationNotFound`] if it is not the caller's.
#[utoipa::path(
    patch,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    summary = "Mark notification read or unread",
    params(
        ("id" = uuid::Uuid, Path, description = "Notification UUID"),
        ("x-user-id" = String, Header, description = "Authenticated user ID"),
    ),
    request_body = UpdateNotificationRequest,
    responses(
        (status = 200, description = "Updated notification", body = Notification),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn update_notification(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<UpdateNotificationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let notification = state
        .notification_service
        .set_read(NotificationId::from_uuid(id), user.as_str(), req.read)
        .await?;
    Ok(Json(notification))
}

/// `DELETE /notifications/{id}` — Delete a notification.
///
/// # Errors
///
/// Returns [`GatewayError::NotificationNotFound`] if it is not the caller's.
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    tag = "Notifications",
    summary = "Delete notification",
    params(
        ("id" = uuid::Uuid, Path, description = "Notification UUID"),
        ("x-user-id" = String, Header, description = "Authenticated user ID"),
    ),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found", body = ErrorResponse),
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    user: UserId,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, GatewayError> {
    state
        .notification_service
        .delete(NotificationId::from_uuid(id), user.as_str())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /notifications/read-all` — Mark every notification read.
///
/// # Errors
///
/// Returns a store error.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/read-all",
    tag = "Notifications",
    summary = "Mark all notifications read",
    params(("x-user-id" = String, Header, description = "Authenticated user ID")),
    responses(
        (status = 200, description = "Count of updated notifications", body = MarkAllReadResponse),
        (status = 401, description = "Missing user", body = ErrorResponse),
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    user: UserId,
) -> Result<impl IntoResponse, GatewayError> {
    let updated = state.notification_service.mark_all_read(user.as_str()).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// Notification routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/read-all", post(mark_all_read))
        .route(
            "/notifications/{id}",
            patch(update_notification).delete(delete_notification),
        )
}
