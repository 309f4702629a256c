//! Shared DTO types used across multiple endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::GatewayError;

/// `limit` query parameter for top-N endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitParams {
    /// Number of rows to return (1-100, default 10).
    pub limit: Option<usize>,
}

/// Default `limit` for top-N endpoints.
pub const DEFAULT_TOP_LIMIT: usize = 10;

/// Upper bound for top-N endpoints.
pub const MAX_TOP_LIMIT: usize = 100;

/// Validates an optional limit against `1..=max`, applying `default`.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when the limit is out of range.
pub fn resolve_limit(limit: Option<usize>, default: usize, max: usize) -> Result<usize, GatewayError> {
    match limit {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(_) => Err(GatewayError::InvalidRequest(format!(
            "limit must be between 1 and {max}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_bounds() {
        assert_eq!(resolve_limit(None, 10, 100).ok(), Some(10));
        assert_eq!(resolve_limit(Some(100), 10, 100).ok(), Some(100));
        assert!(resolve_limit(Some(0), 10, 100).is_err());
        assert!(resolve_limit(Some(101), 10, 100).is_err());
    }
}
