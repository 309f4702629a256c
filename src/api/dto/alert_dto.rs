//! DTOs for alert endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Alert, AlertType};

/// Request body for `POST /alerts`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateAlertRequest {
    /// Asset ticker (stored upper-cased).
    pub asset: String,
    /// Platform display name.
    pub platform: String,
    /// `above` or `below`.
    pub alert_type: AlertType,
    /// Threshold APR in percent.
    pub threshold: f64,
}

/// Request body for `PATCH /alerts/{id}`.
#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
pub struct UpdateAlertRequest {
    /// New armed state.
    pub is_active: bool,
}

/// A user's alerts.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AlertListResponse {
    /// Number of alerts.
    pub count: usize,
    /// Alerts, newest first.
    pub data: Vec<Alert>,
}
