//! OKX simple-earn savings rates.
//!
//! Reads the public lending-rate summary, which reports one annualized
//! rate per currency as a decimal fraction (`"0.05"` means 5 %).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::YieldSource;
use crate::domain::{Opportunity, PlatformType, RiskLevel};
use crate::error::GatewayError;

/// Name used in config and in `Opportunity::source`.
pub const SOURCE_NAME: &str = "okx";

const PLATFORM: &str = "OKX";
const SUMMARY_PATH: &str = "/api/v5/finance/savings/lending-rate-summary";

/// OKX savings adapter.
#[derive(Debug, Clone)]
pub struct OkxSavingsSource {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct OkxEnvelope {
    code: String,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Vec<OkxRateSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxRateSummary {
    ccy: String,
    #[serde(default)]
    est_rate: Option<String>,
    #[serde(default)]
    pre_rate: Option<String>,
    #[serde(default)]
    avg_rate: Option<String>,
}

impl OkxSavingsSource {
    /// Creates the adapter against `base_url` (e.g. `https://www.okx.com`).
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl YieldSource for OkxSavingsSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>, GatewayError> {
        let url = format!("{}{SUMMARY_PATH}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?
            .error_for_status()
            .map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?;

        let body = response
            .text()
            .await
            .map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?;

        parse_summary(&body, Utc::now())
    }
}

/// Parses a lending-rate summary body into opportunities.
///
/// The estimated next rate is preferred, then the previous rate, then the
/// 24h average. Currencies with no positive rate are dropped.
fn parse_summary(body: &str, now: DateTime<Utc>) -> Result<Vec<Opportunity>, GatewayError> {
    let envelope: OkxEnvelope =
        serde_json::from_str(body).map_err(|e| GatewayError::adapter(SOURCE_NAME, e))?;

    if envelope.code != "0" {
        return Err(GatewayError::adapter(
            SOURCE_NAME,
            format!("api error {}: {}", envelope.code, envelope.msg),
        ));
    }

    let opportunities = envelope
        .data
        .into_iter()
        .filter_map(|row| {
            let rate = [&row.est_rate, &row.pre_rate, &row.avg_rate]
                .into_iter()
                .flatten()
                .find_map(|raw| raw.parse::<f64>().ok().filter(|r| *r > 0.0))?;
            let asset = row.ccy.to_ascii_uppercase();
            Some(Opportunity {
                platform: PLATFORM.to_string(),
                asset: asset.clone(),
                symbol: asset,
                platform_type: PlatformType::Exchange,
                chain: "off-chain".to_string(),
                apr: rate * 100.0,
                apy: None,
                lock_period: None,
                min_stake: None,
                risk_level: Some(RiskLevel::Low),
                source: SOURCE_NAME.to_string(),
                last_updated: now,
            })
        })
        .collect();

    Ok(opportunities)
}
