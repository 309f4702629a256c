//! DTOs for history and trend endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::HistoryPoint;

/// Default number of history points returned (one week of hourly points).
pub const DEFAULT_HISTORY_LIMIT: usize = 168;

/// Upper bound for history reads.
pub const MAX_HISTORY_LIMIT: usize = 2000;

/// Query for `GET /history`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryParams {
    /// Asset ticker, case-insensitive.
    pub asset: String,
    /// Platform name, case-insensitive.
    pub platform: String,
    /// Only points captured at or after this RFC 3339 instant.
    pub since: Option<DateTime<Utc>>,
    /// Maximum number of points (1-2000, default 168).
    pub limit: Option<usize>,
}

/// A history series, newest point first.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HistoryResponse {
    /// Requested asset.
    pub asset: String,
    /// Requested platform.
    pub platform: String,
    /// Number of points.
    pub count: usize,
    /// Points, newest first.
    pub data: Vec<HistoryPoint>,
}

/// Query for `GET /trend`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TrendParams {
    /// Asset ticker, case-insensitive.
    pub asset: String,
    /// Platform name, case-insensitive.
    pub platform: String,
    /// Comma-separated lookbacks such as `24h,7d`. Defaults to `24h,7d`.
    pub lookback: Option<String>,
}
