//! DTOs for notification endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Notification;

/// Query for `GET /notifications`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationParams {
    /// Only return unread notifications.
    #[serde(default)]
    pub unread_only: bool,
}

/// Request body for `PATCH /notifications/{id}`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct UpdateNotificationRequest {
    /// New read state.
    pub read: bool,
}

/// A user's notifications.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationListResponse {
    /// Number of notifications returned.
    pub count: usize,
    /// How many of them are unread.
    pub unread: usize,
    /// Notifications, newest first.
    pub data: Vec<Notification>,
}

/// Result of `POST /notifications/read-all`.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct MarkAllReadResponse {
    /// Notifications switched to read.
    pub updated: u64,
}
