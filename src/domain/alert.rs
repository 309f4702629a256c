//! User-defined APR threshold alerts and the live-rate lookup they run on.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AlertId, Opportunity};

/// Threshold comparison of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Fires when the live APR is at or above the threshold.
    Above,
    /// Fires when the live APR is at or below the threshold.
    Below,
}

impl AlertType {
    /// Returns the lower-case storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Above => "above",
            Self::Below => "below",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "above" => Ok(Self::Above),
            "below" => Ok(Self::Below),
            other => Err(format!("unknown alert type: {other}")),
        }
    }
}

/// A threshold alert owned by one user.
///
/// Alerts stay armed after firing; `last_triggered` only starts a cooldown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    /// Alert identifier.
    pub id: AlertId,
    /// Owning user (opaque, provided by the upstream auth layer).
    pub user_id: String,
    /// Upper-cased asset ticker.
    pub asset: String,
    /// Platform display name.
    pub platform: String,
    /// Comparison direction.
    pub alert_type: AlertType,
    /// Threshold APR in percent.
    pub threshold: f64,
    /// Only active alerts are evaluated.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last time this alert produced a notification.
    pub last_triggered: Option<DateTime<Utc>>,
}

impl Alert {
    /// Creates an active, never-triggered alert.
    #[must_use]
    pub fn new(
        user_id: &str,
        asset: &str,
        platform: &str,
        alert_type: AlertType,
        threshold: f64,
    ) -> Self {
        Self {
            id: AlertId::new(),
            user_id: user_id.to_string(),
            asset: asset.trim().to_ascii_uppercase(),
            platform: platform.trim().to_string(),
            alert_type,
            threshold,
            is_active: true,
            created_at: Utc::now(),
            last_triggered: None,
        }
    }

    /// Returns `true` when `apr` satisfies the threshold predicate.
    #[must_use]
    pub fn is_crossed_by(&self, apr: f64) -> bool {
        match self.alert_type {
            AlertType::Above => apr >= self.threshold,
            AlertType::Below => apr <= self.threshold,
        }
    }

    /// Returns `true` while `now` is within `cooldown` of the last trigger.
    #[must_use]
    pub fn is_on_cooldown(&self, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.last_triggered
            .is_some_and(|triggered| now - triggered < cooldown)
    }

    /// Returns `true` when the alert should fire for `apr` at `now`.
    #[must_use]
    pub fn should_fire(&self, apr: f64, now: DateTime<Utc>, cooldown: Duration) -> bool {
        self.is_active && self.is_crossed_by(apr) && !self.is_on_cooldown(now, cooldown)
    }
}

/// Builds the lookup key used for live rates: lower-cased platform and
/// upper-cased asset joined with `-` (e.g. `"okx-BTC"`).
#[must_use]
pub fn rate_key(platform: &str, asset: &str) -> String {
    format!(
        "{}-{}",
        platform.trim().to_ascii_lowercase(),
        asset.trim().to_ascii_uppercase()
    )
}

/// Live APR per (platform, asset), built from the freshest fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveRates {
    rates: HashMap<String, f64>,
}

impl LiveRates {
    /// Creates an empty rate map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the map from fetched opportunities. When several rows share
    /// a key (different lock periods), the highest APR wins.
    #[must_use]
    pub fn from_opportunities(opportunities: &[Opportunity]) -> Self {
        let mut rates = Self::new();
        for opp in opportunities {
            rates.insert_max(&opp.platform, &opp.asset, opp.apr);
        }
        rates
    }

    /// Sets the rate for a key, replacing any previous value.
    pub fn insert(&mut self, platform: &str, asset: &str, apr: f64) {
        self.rates.insert(rate_key(platform, asset), apr);
    }

    /// Sets the rate for a key unless a higher one is already present.
    pub fn insert_max(&mut self, platform: &str, asset: &str, apr: f64) {
        self.rates
            .entry(rate_key(platform, asset))
            .and_modify(|current| *current = current.max(apr))
            .or_insert(apr);
    }

    /// Looks up the live rate for a platform/asset pair.
    #[must_use]
    pub fn get(&self, platform: &str, asset: &str) -> Option<f64> {
        self.rates.get(&rate_key(platform, asset)).copied()
    }

    /// Looks up a rate by its raw key.
    #[must_use]
    pub fn get_by_key(&self, key: &str) -> Option<f64> {
        self.rates.get(key).copied()
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rates.len()
    }

    /// Returns `true` when no rates are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}
