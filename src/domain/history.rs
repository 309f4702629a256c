//! Persisted snapshots and the down-sampled APR time series.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::Opportunity;

/// A persisted, timestamped copy of one opportunity from one sync cycle.
///
/// Append-only: snapshots are never updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Snapshot {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// The captured opportunity.
    #[serde(flatten)]
    pub opportunity: Opportunity,
    /// When the sync cycle fetched this row.
    pub fetched_at: DateTime<Utc>,
}

impl Snapshot {
    /// Wraps an opportunity fetched at `fetched_at`.
    #[must_use]
    pub fn new(opportunity: Opportunity, fetched_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            opportunity,
            fetched_at,
        }
    }
}

/// Identity of one history series.
///
/// Both parts are trimmed, the platform is compared case-insensitively and
/// the asset is upper-cased, so `" okx"/"btc "` and `"OKX"/"BTC"` land in
/// the same series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    /// Lower-cased platform.
    pub platform: String,
    /// Upper-cased asset.
    pub asset: String,
}

impl SeriesKey {
    /// Builds a normalized key.
    #[must_use]
    pub fn new(platform: &str, asset: &str) -> Self {
        Self {
            platform: platform.trim().to_ascii_lowercase(),
            asset: asset.trim().to_ascii_uppercase(),
        }
    }
}

/// One down-sampled sample of a (platform, asset) series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HistoryPoint {
    /// Row identifier.
    pub id: uuid::Uuid,
    /// Platform display name.
    pub platform: String,
    /// Canonical asset ticker.
    pub asset: String,
    /// Listing symbol.
    pub symbol: String,
    /// APR in percent.
    pub apr: f64,
    /// APY in percent.
    pub apy: f64,
    /// Source that produced the latest value in this bucket.
    pub source: String,
    /// Bucket start: when the point was first captured.
    pub captured_at: DateTime<Utc>,
}

impl HistoryPoint {
    /// Builds a new point from an opportunity captured at `captured_at`.
    #[must_use]
    pub fn from_opportunity(opp: &Opportunity, captured_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            platform: opp.platform.clone(),
            asset: opp.asset.to_ascii_uppercase(),
            symbol: opp.symbol.clone(),
            apr: opp.apr,
            apy: opp.effective_apy(),
            source: opp.source.clone(),
            captured_at,
        }
    }

    /// Returns the normalized series key.
    #[must_use]
    pub fn series_key(&self) -> SeriesKey {
        SeriesKey::new(&self.platform, &self.asset)
    }
}

/// Outcome of a single history upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryWrite {
    /// No point existed inside the bucket window; a new point was inserted.
    Inserted,
    /// A point inside the window was refreshed in place.
    Updated,
}

/// Filter for history reads.
#[derive(Debug, Clone)]
pub struct HistoryQuery {
    /// Series to read.
    pub series: SeriesKey,
    /// Only points captured at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Only points captured at or before this instant.
    pub until: Option<DateTime<Utc>>,
    /// Maximum number of points returned.
    pub limit: usize,
}
