//! Normalized yield offer produced by every source.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lock period label used in dedup keys when an offer has no lock.
pub const FLEXIBLE_LOCK: &str = "flex";

/// Kind of venue offering the yield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlatformType {
    /// Centralized exchange earn/savings product.
    Exchange,
    /// On-chain DeFi protocol.
    Defi,
}

impl PlatformType {
    /// Returns the lower-case storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Exchange => "exchange",
            Self::Defi => "defi",
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exchange" | "cex" => Ok(Self::Exchange),
            "defi" => Ok(Self::Defi),
            other => Err(format!("unknown platform type: {other}")),
        }
    }
}

/// Coarse risk classification attached by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    /// Single-asset, no impermanent loss.
    Low,
    /// Moderate exposure.
    Medium,
    /// Multi-asset or impermanent-loss exposure.
    High,
}

impl RiskLevel {
    /// Returns the lower-case storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

/// One yield offer from one platform for one asset at a point in time.
///
/// Produced fresh on every fetch and never mutated afterwards. Rates are
/// expressed in percent (`5.0` means 5 %).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Opportunity {
    /// Platform display name (e.g. `"OKX"`, `"Aave V3"`).
    pub platform: String,
    /// Canonical asset ticker, upper-case (e.g. `"USDT"`).
    pub asset: String,
    /// Listing symbol as reported by the source.
    pub symbol: String,
    /// Venue kind.
    pub platform_type: PlatformType,
    /// Chain name, or `"off-chain"` for exchange products.
    pub chain: String,
    /// Annual percentage rate.
    pub apr: f64,
    /// Annual percentage yield, when the source reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apy: Option<f64>,
    /// Lock period label (e.g. `"30d"`); `None` for flexible products.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_period: Option<String>,
    /// Minimum stake in asset units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stake: Option<f64>,
    /// Risk classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,
    /// Name of the source that produced this row.
    pub source: String,
    /// When the source last refreshed this rate.
    pub last_updated: DateTime<Utc>,
}

impl Opportunity {
    /// Returns the dedup key `(platform, symbol, lock_period | "flex")`.
    #[must_use]
    pub fn dedup_key(&self) -> OpportunityKey {
        OpportunityKey {
            platform: self.platform.to_ascii_lowercase(),
            symbol: self.symbol.to_ascii_uppercase(),
            lock_period: self
                .lock_period
                .as_deref()
                .map_or_else(|| FLEXIBLE_LOCK.to_string(), str::to_ascii_lowercase),
        }
    }

    /// Returns the APY, deriving it from the APR with daily compounding
    /// when the source did not report one.
    #[must_use]
    pub fn effective_apy(&self) -> f64 {
        self.apy.unwrap_or_else(|| apr_to_apy(self.apr))
    }

    /// Returns `true` when `symbol` matches either the listing symbol or
    /// the canonical asset, ignoring case.
    #[must_use]
    pub fn matches_symbol(&self, symbol: &str) -> bool {
        self.symbol.eq_ignore_ascii_case(symbol) || self.asset.eq_ignore_ascii_case(symbol)
    }
}

/// Identity of an opportunity within one fetch cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpportunityKey {
    /// Lower-cased platform.
    pub platform: String,
    /// Upper-cased symbol.
    pub symbol: String,
    /// Lower-cased lock period, `"flex"` when absent.
    pub lock_period: String,
}

const COMPOUNDING_PERIODS: f64 = 365.0;

/// Converts an APR (percent) to an APY (percent) with daily compounding.
#[must_use]
pub fn apr_to_apy(apr: f64) -> f64 {
    ((1.0 + apr / 100.0 / COMPOUNDING_PERIODS).powf(COMPOUNDING_PERIODS) - 1.0) * 100.0
}

/// Converts an APY (percent) to an APR (percent) assuming daily compounding.
#[must_use]
pub fn apy_to_apr(apy: f64) -> f64 {
    if apy <= -100.0 {
        return 0.0;
    }
    ((1.0 + apy / 100.0).powf(1.0 / COMPOUNDING_PERIODS) - 1.0) * COMPOUNDING_PERIODS * 100.0
}
