//! Yield sources and the aggregation registry.
//!
//! A [`YieldSource`] fetches raw listings from one external venue and
//! normalizes them into [`Opportunity`] records. The [`AggregationRegistry`]
//! fans out to every configured source, tolerates individual failures, and
//! deduplicates the merged result.

pub mod defillama;
pub mod okx;
pub mod registry;
pub mod sample;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::GatewayConfig;
use crate::domain::Opportunity;
use crate::error::GatewayError;

pub use defillama::DefiLlamaSource;
pub use okx::OkxSavingsSource;
pub use registry::{AggregationRegistry, AggregationReport, SourceFailure};
pub use sample::SampleSource;

/// Capability shared by every exchange or protocol adapter.
#[async_trait]
pub trait YieldSource: Send + Sync + fmt::Debug {
    /// Stable source name used in logs and in `Opportunity::source`.
    fn name(&self) -> &str;

    /// Fetches the current listings from the venue.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AdapterUnavailable`] on transport, status,
    /// or decoding failures.
    async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>, GatewayError>;
}

/// Builds the shared HTTP client used by network sources.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the TLS backend cannot be
/// initialized.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, GatewayError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("apr-gateway/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| GatewayError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Instantiates the sources named in `config.sources`.
///
/// Unknown names are logged and skipped.
///
/// # Errors
///
/// Returns [`GatewayError::Internal`] if the HTTP client cannot be built.
pub fn build_sources(config: &GatewayConfig) -> Result<Vec<Arc<dyn YieldSource>>, GatewayError> {
    let client = http_client(config.source_timeout)?;
    let mut sources: Vec<Arc<dyn YieldSource>> = Vec::with_capacity(config.sources.len());

    for name in &config.sources {
        match name.as_str() {
            okx::SOURCE_NAME => sources.push(Arc::new(OkxSavingsSource::new(
                client.clone(),
                config.okx_base_url.clone(),
            ))),
            defillama::SOURCE_NAME => sources.push(Arc::new(DefiLlamaSource::new(
                client.clone(),
                config.defillama_url.clone(),
                config.defillama_projects.clone(),
                config.defillama_min_tvl_usd,
            ))),
            sample::SOURCE_NAME => sources.push(Arc::new(SampleSource::default())),
            other => tracing::warn!(source = other, "unknown yield source in config, skipping"),
        }
    }

    tracing::info!(count = sources.len(), "yield sources configured");
    Ok(sources)
}
