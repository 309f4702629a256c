//! History and trend handlers.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Duration, Utc};

use crate::api::dto::{
    DEFAULT_HISTORY_LIMIT, HistoryParams, HistoryResponse, MAX_HISTORY_LIMIT, TrendParams,
    resolve_limit,
};
use crate::app_state::AppState;
use crate::domain::{TrendReport, parse_lookback};
use crate::error::{ErrorResponse, GatewayError};

/// Lookbacks reported when the request names none.
const DEFAULT_LOOKBACKS: [&str; 2] = ["24h", "7d"];

/// `GET /history` — Down-sampled APR series of one platform/asset.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for blank identifiers or an
/// out-of-range limit, or a store error.
#[utoipa::path(
    get,
    path = "/api/v1/history",
    tag = "History",
    summary = "APR history",
    description = "Returns at most one point per hour for the series, newest first.",
    params(HistoryParams),
    responses(
        (status = 200, description = "History points", body = HistoryResponse),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse),
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let (asset, platform) = require_series(&params.asset, &params.platform)?;
    let limit = resolve_limit(params.limit, DEFAULT_HISTORY_LIMIT, MAX_HISTORY_LIMIT)?;

    let data = state
        .history_service
        .get_history(asset, platform, params.since, limit)
        .await?;

    Ok(Json(HistoryResponse {
        asset: asset.to_ascii_uppercase(),
        platform: platform.to_string(),
        count: data.len(),
        data,
    }))
}

/// `GET /trend` — APR trend of one platform/asset.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidLookback`] for a malformed lookback and
/// [`GatewayError::SeriesNotFound`] when the series has no history.
#[utoipa::path(
    get,
    path = "/api/v1/trend",
    tag = "History",
    summary = "APR trend",
    description = "Compares the newest history point with the closest point at or before each lookback. Defaults to 24h and 7d.",
    params(TrendParams),
    responses(
        (status = 200, description = "Trend per lookback", body = TrendReport),
        (status = 400, description = "Invalid lookback", body = ErrorResponse),
        (status = 404, description = "No history for the series", body = ErrorResponse),
    )
)]
pub async fn get_trend(
    State(state): State<AppState>,
    Query(params): Query<TrendParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let (asset, platform) = require_series(&params.asset, &params.platform)?;
    let lookbacks = parse_lookbacks(params.lookback.as_deref())?;

    let report = state
        .history_service
        .get_trend(asset, platform, &lookbacks, Utc::now())
        .await?;
    Ok(Json(report))
}

/// Trims both identifiers and rejects blanks.
fn require_series<'a>(asset: &'a str, platform: &'a str) -> Result<(&'a str, &'a str), GatewayError> {
    let (asset, platform) = (asset.trim(), platform.trim());
    if asset.is_empty() || platform.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "asset and platform are required".to_string(),
        ));
    }
    Ok((asset, platform))
}

/// Parses a comma-separated lookback list, falling back to the defaults.
fn parse_lookbacks(raw: Option<&str>) -> Result<Vec<(String, Duration)>, GatewayError> {
    let labels: Vec<&str> = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(list) => list.split(',').map(str::trim).filter(|s| !s.is_empty()).collect(),
        None => DEFAULT_LOOKBACKS.to_vec(),
    };
    labels
        .into_iter()
        .map(|label| parse_lookback(label).map(|d| (label.to_string(), d)))
        .collect()
}

/// History routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/history", get(get_history))
        .route("/trend", get(get_trend))
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn default_lookbacks_are_day_and_week() {
        let Ok(lookbacks) = parse_lookbacks(None) else {
            panic!("defaults parse");
        };
        assert_eq!(lookbacks.len(), 2);
        assert_eq!(lookbacks[0], ("24h".to_string(), Duration::hours(24)));
        assert_eq!(lookbacks[1], ("7d".to_string(), Duration::days(7)));
    }

    #[test]
    fn custom_list_is_parsed_in_order() {
        let Ok(lookbacks) = parse_lookbacks(Some("1h, 30m")) else {
            panic!("list parses");
        };
        assert_eq!(lookbacks[0].1, Duration::hours(1));
        assert_eq!(lookbacks[1].1, Duration::minutes(30));
    }

    #[test]
    fn bad_entry_fails_the_request() {
        assert!(matches!(
            parse_lookbacks(Some("24h,forever")),
            Err(GatewayError::InvalidLookback(_))
        ));
    }
}
