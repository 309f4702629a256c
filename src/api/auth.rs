//! Request extractors for caller identity and admin authorization.
//!
//! User identity comes from the `x-user-id` header set by the upstream
//! authentication layer. Admin routes require the shared cron secret as
//! `Authorization: Bearer <secret>` or `x-cron-secret: <secret>`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};

use crate::app_state::AppState;
use crate::error::GatewayError;

/// Header carrying the authenticated user ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Alternative header carrying the cron secret.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Authenticated caller of a user-scoped route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    /// The raw user ID.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S: Send + Sync> FromRequestParts<S> for UserId {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .ok_or_else(|| GatewayError::Unauthorized(format!("missing {USER_ID_HEADER} header")))
    }
}

/// Marker proving the request carried the configured cron secret.
#[derive(Debug, Clone, Copy)]
pub struct CronAuth;

impl FromRequestParts<AppState> for CronAuth {
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.cron_secret.as_deref() else {
            tracing::warn!("admin call rejected: no cron secret configured");
            return Err(GatewayError::Unauthorized("admin access is disabled".to_string()));
        };

        match presented_secret(&parts.headers) {
            Some(given) if constant_time_eq(given.as_bytes(), expected.as_bytes()) => Ok(Self),
            Some(_) => Err(GatewayError::Unauthorized("invalid cron secret".to_string())),
            None => Err(GatewayError::Unauthorized("missing cron secret".to_string())),
        }
    }
}

/// Extracts the secret from `Authorization: Bearer` or `x-cron-secret`.
fn presented_secret(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    bearer
        .or_else(|| {
            headers
                .get(CRON_SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .filter(|v| !v.is_empty())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_takes_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(CRON_SECRET_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_secret(&headers), Some("abc"));
    }

    #[test]
    fn header_fallback_and_blank_values() {
        let mut headers = HeaderMap::new();
        assert_eq!(presented_secret(&headers), None);
        headers.insert(CRON_SECRET_HEADER, HeaderValue::from_static("  "));
        assert_eq!(presented_secret(&headers), None);
        headers.insert(CRON_SECRET_HEADER, HeaderValue::from_static("xyz"));
        assert_eq!(presented_secret(&headers), Some("xyz"));
    }

    #[test]
    fn secret_comparison() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
