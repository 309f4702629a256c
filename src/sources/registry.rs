//! Fan-out aggregation over every configured [`YieldSource`].
//!
//! [`AggregationRegistry`] invokes all sources concurrently, each bounded by
//! a timeout, and waits for every call to settle. A failing or slow source
//! contributes zero rows; the merged result is deduplicated per
//! `(platform, symbol, lock_period | "flex")`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use super::YieldSource;
use crate::domain::{Opportunity, OpportunityKey};
use crate::error::GatewayError;

/// A source that failed during one aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFailure {
    /// Source name.
    pub source_name: String,
    /// Failure reason.
    pub reason: String,
}

/// Result of one aggregation pass.
#[derive(Debug, Clone, Default)]
pub struct AggregationReport {
    /// Deduplicated opportunities, in first-seen order.
    pub opportunities: Vec<Opportunity>,
    /// Sources that failed or timed out.
    pub failures: Vec<SourceFailure>,
}

/// Holds the configured sources and answers aggregate queries.
#[derive(Clone)]
pub struct AggregationRegistry {
    sources: Vec<Arc<dyn YieldSource>>,
    timeout: Duration,
}

impl fmt::Debug for AggregationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationRegistry")
            .field("sources", &self.source_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AggregationRegistry {
    /// Creates a registry over `sources`, bounding each call by `timeout`.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn YieldSource>>, timeout: Duration) -> Self {
        Self { sources, timeout }
    }

    /// Names of the configured sources, in registration order.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Runs every source and merges the results, reporting failures.
    pub async fn aggregate(&self) -> AggregationReport {
        let calls = self.sources.iter().map(|source| {
            let source = Arc::clone(source);
            let timeout = self.timeout;
            async move {
                let name = source.name().to_string();
                let outcome = match tokio::time::timeout(timeout, source.fetch_opportunities()).await
                {
                    Ok(result) => result,
                    Err(_) => Err(GatewayError::adapter(
                        &name,
                        format!("timed out after {} ms", timeout.as_millis()),
                    )),
                };
                (name, outcome)
            }
        });

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for (name, outcome) in join_all(calls).await {
            match outcome {
                Ok(mut fetched) => {
                    tracing::debug!(source = %name, count = fetched.len(), "source fetched");
                    rows.append(&mut fetched);
                }
                Err(e) => {
                    tracing::warn!(source = %name, error = %e, "source failed, skipping");
                    failures.push(SourceFailure {
                        source_name: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        AggregationReport {
            opportunities: dedupe(rows),
            failures,
        }
    }

    /// Returns every deduplicated opportunity from all sources.
    pub async fn fetch_all(&self) -> Vec<Opportunity> {
        self.aggregate().await.opportunities
    }

    /// Returns opportunities whose symbol or asset matches `symbol`,
    /// highest APR first.
    pub async fn fetch_by_symbol(&self, symbol: &str) -> Vec<Opportunity> {
        let matching: Vec<Opportunity> = self
            .fetch_all()
            .await
            .into_iter()
            .filter(|o| o.matches_symbol(symbol))
            .collect();
        top_n(matching, usize::MAX)
    }

    /// Returns the `n` highest-APR opportunities.
    pub async fn fetch_top(&self, n: usize) -> Vec<Opportunity> {
        top_n(self.fetch_all().await, n)
    }
}

/// Collapses rows sharing a dedup key. The row with the most recent
/// `last_updated` wins and takes the position of the first occurrence.
#[must_use]
pub fn dedupe(rows: Vec<Opportunity>) -> Vec<Opportunity> {
    let mut index: HashMap<OpportunityKey, usize> = HashMap::with_capacity(rows.len());
    let mut merged: Vec<Opportunity> = Vec::with_capacity(rows.len());

    for row in rows {
        let key = row.dedup_key();
        match index.get(&key).copied() {
            Some(pos) => {
                if let Some(existing) = merged.get_mut(pos)
                    && row.last_updated > existing.last_updated
                {
                    *existing = row;
                }
            }
            None => {
                index.insert(key, merged.len());
                merged.push(row);
            }
        }
    }

    merged
}

/// Sorts by APR descending and keeps the first `n`. The sort is stable,
/// but ordering among equal APRs is not part of the contract.
#[must_use]
pub fn top_n(mut rows: Vec<Opportunity>, n: usize) -> Vec<Opportunity> {
    rows.sort_by(|a, b| b.apr.total_cmp(&a.apr));
    rows.truncate(n);
    rows
}
