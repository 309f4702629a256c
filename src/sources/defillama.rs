//! DeFi protocol yields via the DeFiLlama pools feed.
//!
//! The feed reports APY per pool; APR is derived assuming daily
//! compounding. Only single-asset pools from the configured projects and
//! above the TVL floor are kept.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::YieldSource;
use crate::domain::opportunity::apy_to_apr;
use crate::domain::{Opportunity, PlatformType, RiskLevel};
use crate::error::GatewayError;

/// Name used in config and in `Opportunity::source`.
pub const SOURCE_NAME: &str = "defillama";

/// DeFiLlama yields adapter.
#[derive(Debug, Clone)]
pub struct DefiLlamaSource {
    client: reqwest::Client,
    url: String,
    projects: Vec<String>,
    min_tvl_usd: f64,
}

#[derive(Debug, Deserialize)]
struct PoolsEnvelope {
    status: String,
    #[serde(default)]
    data: Vec<LlamaPool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LlamaPool {
    chain: String,
    project: String,
    symbol: String,
    #[serde(default)]
    tvl_usd: f64,
    #[serde(default)]
    apy: Option<f64>,
    #[serde(default)]
    stablecoin: bool,
    #[serde(default)]
    il_risk: Option<String>,
    #[serde(default)]
    exposure: Option<String>,
}

impl DefiLlamaSource {
    /// Creates the adapter.
    ///
    /// An empty `projects` list keeps every project.
    #[must_use]
    pub fn new(client: reqwest::Client, url: String, projects: Vec<String>, min_tvl_usd: f64) -> Self {
        Self {
            client,
            url,
            projects: projects
                .into_iter()
                .map(|p| p.trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
            min_tvl_usd,
        }
    }

    fn keeps(&self, pool: &LlamaPool) -> bool {
        let project_allowed = self.projects.is_empty()
            || self
                .projects
                .iter()
                .any(|p| p.eq_ignore_ascii_case(&pool.project));
        let single = pool.exposure.as_deref().is_none_or(|e| e == "single");
        project_allowed && single && pool.tvl_usd >= self.min_tvl_usd
    }

    fn parse_pools(&self, body: &str, now: DateTime<Utc>) -> Result<Vec<Opportunity>, GatewayError> {
        let envelope: PoolsEnvelope =
            serde_json::from_str(body).map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?;

        if envelope.status != "success" {
            return Err(GatewayError::adapter(
                SOURCE_NAME,
                format!("unexpected status {}", envelope.status),
            ));
        }

        Ok(envelope
            .data
            .iter()
            .filter(|pool| self.keeps(pool))
            .filter_map(|pool| to_opportunity(pool, now))
            .collect())
    }
}

#[async_trait]
impl YieldSource for DefiLlamaSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>, GatewayError> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?
            .error_for_status()
            .map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?
            .text()
            .await
            .map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?;

        self.parse_pools(&body, Utc::now())
    }
}

fn to_opportunity(pool: &LlamaPool, now: DateTime<Utc>) -> Option<Opportunity> {
    let apy = pool.apy.filter(|a| a.is_finite() && *a > 0.0)?;
    let risk = match (pool.il_risk.as_deref(), pool.stablecoin) {
        (Some("no"), true) => RiskLevel::Low,
        (Some("no"), false) => RiskLevel::Medium,
        _ => RiskLevel::High,
    };
    Some(Opportunity {
        platform: project_display_name(&pool.project),
        asset: pool.symbol.to_ascii_uppercase(),
        symbol: pool.symbol.clone(),
        platform_type: PlatformType::Defi,
        chain: pool.chain.clone(),
        apr: apy_to_apr(apy),
        apy: Some(apy),
        lock_period: None,
        min_stake: None,
        risk_level: Some(risk),
        source: SOURCE_NAME.to_string(),
        last_updated: now,
    })
}

/// Turns a project slug such as `aave-v3` into `Aave V3`.
fn project_display_name(slug: &str) -> String {
    slug.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let is_version = part.len() > 1
                && part.starts_with('v')
                && part.chars().skip(1).all(|c| c.is_ascii_digit());
            if is_version {
                return part.to_ascii_uppercase();
            }
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().chain(chars).collect()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "status": "success",
        "data": [
            {"chain": "Ethereum", "project": "aave-v3", "symbol": "USDC", "tvlUsd": 500000000.0,
             "apy": 4.2, "stablecoin": true, "ilRisk": "no", "exposure": "single", "pool": "a"},
            {"chain": "Ethereum", "project": "lido", "symbol": "STETH", "tvlUsd": 20000000000.0,
             "apy": 3.1, "stablecoin": false, "ilRisk": "no", "exposure": "single", "pool": "b"},
            {"chain": "Ethereum", "project": "uniswap-v3", "symbol": "USDC-WETH", "tvlUsd": 90000000.0,
             "apy": 12.0, "stablecoin": false, "ilRisk": "yes", "exposure": "multi", "pool": "c"},
            {"chain": "Arbitrum", "project": "aave-v3", "symbol": "DAI", "tvlUsd": 1000.0,
             "apy": 9.0, "stablecoin": true, "ilRisk": "no", "exposure": "single", "pool": "d"},
            {"chain": "Ethereum", "project": "compound-v3", "symbol": "USDT", "tvlUsd": 80000000.0,
             "apy": null, "stablecoin": true, "ilRisk": "no", "exposure": "single", "pool": "e"}
        ]
    }"#;

    fn source(projects: &[&str]) -> DefiLlamaSource {
        DefiLlamaSource::new(
            reqwest::Client::new(),
            "https://yields.llama.fi/pools".to_string(),
            projects.iter().map(|p| (*p).to_string()).collect(),
            1_000_000.0,
        )
    }

    #[test]
    fn keeps_single_asset_pools_above_tvl_floor() {
        let Ok(rows) = source(&[]).parse_pools(BODY, Utc::now()) else {
            panic!("pools should parse");
        };
        let symbols: Vec<&str> = rows.iter().map(|o| o.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["USDC", "STETH"]);
    }

    #[test]
    fn project_allow_list_filters() {
        let Ok(rows) = source(&["Lido"]).parse_pools(BODY, Utc::now()) else {
            panic!("pools should parse");
        };
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].platform, "Lido");
        assert_eq!(rows[0].risk_level, Some(RiskLevel::Medium));
    }

    #[test]
    fn apr_is_derived_from_apy() {
        let Ok(rows) = source(&["aave-v3"]).parse_pools(BODY, Utc::now()) else {
            panic!("pools should parse");
        };
        let usdc = &rows[0];
        assert_eq!(usdc.platform, "Aave V3");
        assert_eq!(usdc.platform_type, PlatformType::Defi);
        assert_eq!(usdc.apy, Some(4.2));
        assert!(usdc.apr < 4.2 && usdc.apr > 4.0);
        assert_eq!(usdc.risk_level, Some(RiskLevel::Low));
    }

    #[test]
    fn non_success_status_is_adapter_error() {
        let body = r#"{"status": "error", "data": []}"#;
        assert!(source(&[]).parse_pools(body, Utc::now()).is_err());
    }

    #[test]
    fn display_names() {
        assert_eq!(project_display_name("aave-v3"), "Aave V3");
        assert_eq!(project_display_name("lido"), "Lido");
        assert_eq!(project_display_name("rocket-pool"), "Rocket Pool");
    }
}
