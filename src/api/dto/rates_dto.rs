//! DTOs for live and stored rate endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Opportunity, Snapshot};

/// Query for `GET /rates/latest`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SymbolParams {
    /// Symbol or asset ticker, case-insensitive.
    pub symbol: String,
}

/// Live aggregated opportunities.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveRatesResponse {
    /// Number of rows.
    pub count: usize,
    /// Opportunities, highest APR first where ordering applies.
    pub data: Vec<Opportunity>,
}

impl From<Vec<Opportunity>> for LiveRatesResponse {
    fn from(data: Vec<Opportunity>) -> Self {
        Self {
            count: data.len(),
            data,
        }
    }
}

/// Rates read from stored snapshots.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StoredRatesResponse {
    /// Number of rows.
    pub count: usize,
    /// `true` when the store failed and the list is empty for that reason.
    pub degraded: bool,
    /// Latest snapshots, highest APR first.
    pub data: Vec<Snapshot>,
}
