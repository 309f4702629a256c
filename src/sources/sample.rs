//! Fixed in-memory catalogue.
//!
//! Serves as a fallback data set when no network source is configured and
//! as a deterministic source for tests.

use async_trait::async_trait;
use chrono::Utc;

use super::YieldSource;
use crate::domain::{Opportunity, PlatformType, RiskLevel};
use crate::error::GatewayError;

/// Name used in config and in `Opportunity::source`.
pub const SOURCE_NAME: &str = "sample";

/// Source returning a fixed list of opportunities, re-stamped with the
/// current time on every fetch.
#[derive(Debug, Clone)]
pub struct SampleSource {
    name: String,
    catalogue: Vec<Opportunity>,
}

impl SampleSource {
    /// Creates a source serving `catalogue` under `name`.
    #[must_use]
    pub fn new(name: &str, catalogue: Vec<Opportunity>) -> Self {
        Self {
            name: name.to_string(),
            catalogue,
        }
    }
}

impl Default for SampleSource {
    fn default() -> Self {
        let rows = [
            ("Binance", "USDT", PlatformType::Exchange, "off-chain", 5.2, None),
            ("Binance", "BTC", PlatformType::Exchange, "off-chain", 0.8, None),
            ("OKX", "USDT", PlatformType::Exchange, "off-chain", 4.6, None),
            ("OKX", "USDT", PlatformType::Exchange, "off-chain", 7.5, Some("30d")),
            ("OKX", "ETH", PlatformType::Exchange, "off-chain", 2.1, None),
            ("Bybit", "USDC", PlatformType::Exchange, "off-chain", 6.0, None),
            ("Aave V3", "USDC", PlatformType::Defi, "Ethereum", 4.1, None),
            ("Compound V3", "USDT", PlatformType::Defi, "Ethereum", 3.9, None),
            ("Lido", "STETH", PlatformType::Defi, "Ethereum", 3.0, None),
        ];
        let now = Utc::now();
        let catalogue = rows
            .into_iter()
            .map(|(platform, asset, platform_type, chain, apr, lock)| Opportunity {
                platform: platform.to_string(),
                asset: asset.to_string(),
                symbol: asset.to_string(),
                platform_type,
                chain: chain.to_string(),
                apr,
                apy: None,
                lock_period: lock.map(str::to_string),
                min_stake: None,
                risk_level: Some(match platform_type {
                    PlatformType::Exchange => RiskLevel::Low,
                    PlatformType::Defi => RiskLevel::Medium,
                }),
                source: SOURCE_NAME.to_string(),
                last_updated: now,
            })
            .collect();
        Self::new(SOURCE_NAME, catalogue)
    }
}

#[async_trait]
impl YieldSource for SampleSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>, GatewayError> {
        let now = Utc::now();
        Ok(self
            .catalogue
            .iter()
            .cloned()
            .map(|mut opp| {
                opp.last_updated = now;
                opp
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_catalogue_is_restamped() {
        let source = SampleSource::default();
        let before = Utc::now();
        let Ok(rows) = source.fetch_opportunities().await else {
            panic!("sample source never fails");
        };
        assert_eq!(rows.len(), 9);
        assert!(rows.iter().all(|o| o.last_updated >= before));
        assert_eq!(source.name(), "sample");
    }
}
