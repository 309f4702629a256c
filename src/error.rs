//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid request: limit must be between 1 and 100",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see the table on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                 |
/// |-----------|-----------------|-----------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request             |
/// | 2000–2999 | Not Found       | 404 Not Found               |
/// | 3000–3999 | Server/Upstream | 500 / 502 / 503             |
/// | 4010      | Auth            | 401 Unauthorized            |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Lookback string could not be parsed (expected e.g. `24h`, `7d`).
    #[error("invalid lookback: {0}")]
    InvalidLookback(String),

    /// Alert with the given ID was not found for the caller.
    #[error("alert not found: {0}")]
    AlertNotFound(uuid::Uuid),

    /// Notification with the given ID was not found for the caller.
    #[error("notification not found: {0}")]
    NotificationNotFound(uuid::Uuid),

    /// No history exists for the requested (asset, platform) series.
    #[error("no history for {asset} on {platform}")]
    SeriesNotFound {
        /// Requested asset.
        asset: String,
        /// Requested platform.
        platform: String,
    },

    /// Missing or invalid credentials (user header or cron secret).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A single yield source failed or timed out.
    #[error("source {source_name} unavailable: {reason}")]
    AdapterUnavailable {
        /// Name of the failing source.
        source_name: String,
        /// Failure reason.
        reason: String,
    },

    /// The persistence backend is not reachable.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidLookback(_) => 1002,
            Self::AlertNotFound(_) => 2001,
            Self::NotificationNotFound(_) => 2002,
            Self::SeriesNotFound { .. } => 2003,
            Self::Unauthorized(_) => 4010,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::AdapterUnavailable { .. } => 3002,
            Self::PersistenceUnavailable(_) => 3003,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidLookback(_) => StatusCode::BAD_REQUEST,
            Self::AlertNotFound(_) | Self::NotificationNotFound(_) | Self::SeriesNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::AdapterUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::PersistenceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::PersistenceError(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Builds an [`GatewayError::AdapterUnavailable`] for the named source.
    #[must_use]
    pub fn adapter(source_name: &str, reason: impl std::fmt::Display) -> Self {
        Self::AdapterUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::PersistenceUnavailable(e.to_string())
            }
            other => Self::PersistenceError(other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
