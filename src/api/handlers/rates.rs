//! Rate handlers: live aggregation and stored-snapshot reads.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    DEFAULT_TOP_LIMIT, LimitParams, LiveRatesResponse, MAX_TOP_LIMIT, StoredRatesResponse,
    SymbolParams, resolve_limit,
};
use crate::app_state::AppState;
use crate::domain::Snapshot;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /rates` — All live opportunities.
#[utoipa::path(
    get,
    path = "/api/v1/rates",
    tag = "Rates",
    summary = "List live rates",
    description = "Fetches every configured source concurrently and returns the deduplicated opportunities. Failing sources are skipped.",
    responses(
        (status = 200, description = "Live opportunities", body = LiveRatesResponse),
    )
)]
pub async fn list_rates(State(state): State<AppState>) -> impl IntoResponse {
    Json(LiveRatesResponse::from(state.registry.fetch_all().await))
}

/// `GET /rates/top` — Highest live APRs.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an out-of-range limit.
#[utoipa::path(
    get,
    path = "/api/v1/rates/top",
    tag = "Rates",
    summary = "Top live rates",
    params(LimitParams),
    responses(
        (status = 200, description = "Top opportunities by APR", body = LiveRatesResponse),
        (status = 400, description = "Invalid limit", body = ErrorResponse),
    )
)]
pub async fn top_rates(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let limit = resolve_limit(params.limit, DEFAULT_TOP_LIMIT, MAX_TOP_LIMIT)?;
    Ok(Json(LiveRatesResponse::from(state.registry.fetch_top(limit).await)))
}

/// `GET /rates/symbol/{symbol}` — Live rates for one asset.
#[utoipa::path(
    get,
    path = "/api/v1/rates/symbol/{symbol}",
    tag = "Rates",
    summary = "Live rates by symbol",
    params(
        ("symbol" = String, Path, description = "Symbol or asset ticker, case-insensitive"),
    ),
    responses(
        (status = 200, description = "Matching opportunities, highest APR first", body = LiveRatesResponse),
    )
)]
pub async fn rates_by_symbol(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> impl IntoResponse {
    Json(LiveRatesResponse::from(state.registry.fetch_by_symbol(&symbol).await))
}

/// `GET /rates/latest` — Latest stored snapshot per platform for a symbol.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a blank symbol. Store
/// failures degrade to an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/rates/latest",
    tag = "Rates",
    summary = "Latest stored rates for a symbol",
    params(SymbolParams),
    responses(
        (status = 200, description = "Latest snapshot per platform", body = StoredRatesResponse),
        (status = 400, description = "Missing symbol", body = ErrorResponse),
    )
)]
pub async fn latest_rates(
    State(state): State<AppState>,
    Query(params): Query<SymbolParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let symbol = params.symbol.trim();
    if symbol.is_empty() {
        return Err(GatewayError::InvalidRequest("symbol must not be empty".to_string()));
    }
    Ok(Json(stored(
        state.history_service.get_latest_per_platform(symbol).await,
    )))
}

/// `GET /rates/latest/top` — Highest APRs across latest stored snapshots.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for an out-of-range limit.
/// Store failures degrade to an empty list.
#[utoipa::path(
    get,
    path = "/api/v1/rates/latest/top",
    tag = "Rates",
    summary = "Top stored rates",
    params(LimitParams),
    responses(
        (status = 200, description = "Top latest snapshots by APR", body = StoredRatesResponse),
        (status = 400, description = "Invalid limit", body = ErrorResponse),
    )
)]
pub async fn latest_top(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, GatewayError> {
    let limit = resolve_limit(params.limit, DEFAULT_TOP_LIMIT, MAX_TOP_LIMIT)?;
    Ok(Json(stored(
        state.history_service.get_top_across_snapshots(limit).await,
    )))
}

fn stored(result: Result<Vec<Snapshot>, GatewayError>) -> StoredRatesResponse {
    match result {
        Ok(data) => StoredRatesResponse {
            count: data.len(),
            degraded: false,
            data,
        },
        Err(e) => {
            tracing::warn!(error = %e, "stored rate read failed, serving empty list");
            StoredRatesResponse {
                count: 0,
                degraded: true,
                data: Vec::new(),
            }
        }
    }
}

/// Rate routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rates", get(list_rates))
        .route("/rates/top", get(top_rates))
        .route("/rates/symbol/{symbol}", get(rates_by_symbol))
        .route("/rates/latest", get(latest_rates))
        .route("/rates/latest/top", get(latest_top))
}
