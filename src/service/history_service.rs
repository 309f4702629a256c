//! History service: snapshot persistence, bucketed history, stored-rate
//! reads, and trend derivation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{
    HistoryPoint, HistoryQuery, HistoryWrite, Opportunity, SeriesKey, Snapshot, TrendReport,
    TrendWindow, compute_trend, select_reference,
};
use crate::error::GatewayError;
use crate::persistence::{BulkInsertReport, YieldStore};

/// Counts from one history append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct HistoryAppendReport {
    /// New points.
    pub inserted: usize,
    /// Points refreshed inside their bucket.
    pub updated: usize,
    /// Series whose write failed.
    pub failed: usize,
}

/// Coordinates the store for snapshot and history operations.
#[derive(Debug, Clone)]
pub struct HistoryService {
    store: Arc<dyn YieldStore>,
    bucket: Duration,
}

impl HistoryService {
    /// Creates a service writing history points in buckets of `bucket`.
    #[must_use]
    pub fn new(store: Arc<dyn YieldStore>, bucket: Duration) -> Self {
        Self { store, bucket }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn YieldStore> {
        &self.store
    }

    /// Appends one snapshot per opportunity, all stamped `fetched_at`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceUnavailable`] when the store is
    /// unreachable. Individual row failures are only counted.
    pub async fn save_snapshots(
        &self,
        opportunities: &[Opportunity],
        fetched_at: DateTime<Utc>,
    ) -> Result<BulkInsertReport, GatewayError> {
        if opportunities.is_empty() {
            return Ok(BulkInsertReport::default());
        }
        let snapshots: Vec<Snapshot> = opportunities
            .iter()
            .cloned()
            .map(|opp| Snapshot::new(opp, fetched_at))
            .collect();

        let report = self.store.insert_snapshots(&snapshots).await?;
        if report.failed > 0 {
            tracing::warn!(inserted = report.inserted, failed = report.failed, "partial snapshot insert");
        }
        Ok(report)
    }

    /// Writes one history point per (platform, asset) series.
    ///
    /// Several opportunities for the same series (different lock periods)
    /// collapse to the one with the highest APR. A failing series is
    /// logged and counted; the others are still written.
    pub async fn append_history(
        &self,
        opportunities: &[Opportunity],
        captured_at: DateTime<Utc>,
    ) -> HistoryAppendReport {
        let mut best: HashMap<SeriesKey, &Opportunity> = HashMap::new();
        for opp in opportunities {
            best.entry(SeriesKey::new(&opp.platform, &opp.asset))
                .and_modify(|current| {
                    if opp.apr > current.apr {
                        *current = opp;
                    }
                })
                .or_insert(opp);
        }

        let mut report = HistoryAppendReport::default();
        for (series, opp) in best {
            let point = HistoryPoint::from_opportunity(opp, captured_at);
            match self.store.upsert_history_point(&point, self.bucket).await {
                Ok(HistoryWrite::Inserted) => report.inserted += 1,
                Ok(HistoryWrite::Updated) => report.updated += 1,
                Err(e) => {
                    tracing::warn!(
                        platform = %series.platform,
                        asset = %series.asset,
                        error = %e,
                        "history upsert failed"
                    );
                    report.failed += 1;
                }
            }
        }
        report
    }

    /// Reads a series newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn get_history(
        &self,
        asset: &str,
        platform: &str,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<HistoryPoint>, GatewayError> {
        self.store
            .history(&HistoryQuery {
                series: SeriesKey::new(platform, asset),
                since,
                until: None,
                limit,
            })
            .await
    }

    /// Latest stored snapshot per platform listing matching `symbol`,
    /// highest APR first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn get_latest_per_platform(&self, symbol: &str) -> Result<Vec<Snapshot>, GatewayError> {
        let mut latest: Vec<Snapshot> = self
            .store
            .latest_snapshots()
            .await?
            .into_iter()
            .filter(|s| s.opportunity.matches_symbol(symbol))
            .collect();
        sort_by_apr_desc(&mut latest);
        Ok(latest)
    }

    /// The `n` highest-APR entries among the latest stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn get_top_across_snapshots(&self, n: usize) -> Result<Vec<Snapshot>, GatewayError> {
        let mut latest = self.store.latest_snapshots().await?;
        sort_by_apr_desc(&mut latest);
        latest.truncate(n);
        Ok(latest)
    }

    /// Computes the trend of a series over each `(label, lookback)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SeriesNotFound`] when the series has no
    /// points, [`GatewayError::InvalidLookback`] when a lookback reaches
    /// before the earliest representable time, or a store error.
    pub async fn get_trend(
        &self,
        asset: &str,
        platform: &str,
        lookbacks: &[(String, Duration)],
        now: DateTime<Utc>,
    ) -> Result<TrendReport, GatewayError> {
        let series = SeriesKey::new(platform, asset);
        let newest = self
            .store
            .history(&HistoryQuery {
                series: series.clone(),
                since: None,
                until: None,
                limit: 1,
            })
            .await?;
        let Some(latest) = newest.into_iter().next() else {
            return Err(GatewayError::SeriesNotFound {
                asset: asset.to_string(),
                platform: platform.to_string(),
            });
        };

        let mut windows = Vec::with_capacity(lookbacks.len());
        for (label, lookback) in lookbacks {
            let Some(cutoff) = now.checked_sub_signed(*lookback) else {
                return Err(GatewayError::InvalidLookback(label.clone()));
            };
            let candidates = self
                .store
                .history(&HistoryQuery {
                    series: series.clone(),
                    since: None,
                    until: Some(cutoff),
                    limit: 1,
                })
                .await?;
            let reference = select_reference(&candidates, now, *lookback);
            windows.push(TrendWindow {
                lookback: label.clone(),
                reference_apr: reference.map(|p| p.apr),
                reference_at: reference.map(|p| p.captured_at),
                trend: compute_trend(latest.apr, reference.map(|p| p.apr)),
            });
        }

        Ok(TrendReport {
            asset: latest.asset,
            platform: latest.platform,
            latest_apr: latest.apr,
            latest_at: latest.captured_at,
            windows,
        })
    }

    /// Deletes snapshots older than `retention_days`. Zero keeps everything.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn prune_snapshots(
        &self,
        retention_days: u64,
        now: DateTime<Utc>,
    ) -> Result<u64, GatewayError> {
        if retention_days == 0 {
            return Ok(0);
        }
        let days = i64::try_from(retention_days).unwrap_or(i64::MAX);
        let Some(cutoff) = Duration::try_days(days).and_then(|d| now.checked_sub_signed(d)) else {
            return Ok(0);
        };
        let deleted = self.store.delete_snapshots_before(cutoff).await?;
        if deleted > 0 {
            tracing::info!(deleted, retention_days, "old snapshots pruned");
        }
        Ok(deleted)
    }
}

fn sort_by_apr_desc(rows: &mut [Snapshot]) {
    rows.sort_by(|a, b| b.opportunity.apr.total_cmp(&a.opportunity.apr));
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::domain::TrendDirection;
    use crate::domain::opportunity::fixtures::opportunity;
    use crate::persistence::faulty::FaultyStore;
    use crate::persistence::{MemoryStore, YieldStore};

    fn service() -> HistoryService {
        HistoryService::new(Arc::new(MemoryStore::new()), Duration::hours(1))
    }

    #[tokio::test]
    async fn partial_snapshot_insert_is_reported() {
        let store = Arc::new(FaultyStore {
            reject_snapshot_symbol: Some("ETH".to_string()),
            ..FaultyStore::default()
        });
        let service = HistoryService::new(Arc::clone(&store) as Arc<dyn YieldStore>, Duration::hours(1));
        let now = Utc::now();
        let batch = [
            opportunity("OKX", "BTC", 5.0, now),
            opportunity("OKX", "ETH", 3.0, now),
            opportunity("Binance", "BTC", 4.0, now),
        ];

        let Ok(report) = service.save_snapshots(&batch, now).await else {
            panic!("partial failure should not be an error");
        };
        assert_eq!(report, BulkInsertReport { inserted: 2, failed: 1 });

        let Ok(latest) = store.latest_snapshots().await else {
            panic!("read failed");
        };
        assert_eq!(latest.len(), 2);
    }

    #[tokio::test]
    async fn unreachable_snapshot_store_is_an_error() {
        let store = Arc::new(FaultyStore {
            snapshots_unavailable: true,
            ..FaultyStore::default()
        });
        let service = HistoryService::new(store, Duration::hours(1));
        let now = Utc::now();

        let result = service.save_snapshots(&[opportunity("OKX", "BTC", 5.0, now)], now).await;
        assert!(matches!(result, Err(GatewayError::PersistenceUnavailable(_))));
    }

    #[tokio::test]
    async fn trend_with_unrepresentable_lookback_is_rejected() {
        let service = service();
        let now = Utc::now();
        let _ = service
            .append_history(&[opportunity("OKX", "BTC", 5.0, now)], now)
            .await;

        let lookbacks = [("100000000d".to_string(), Duration::days(100_000_000))];
        let result = service.get_trend("BTC", "OKX", &lookbacks, now).await;
        assert!(matches!(result, Err(GatewayError::InvalidLookback(_))));
    }

    #[tokio::test]
    async fn append_history_keeps_one_point_per_hour() {
        let service = service();
        let t0 = Utc::now() - Duration::hours(3);

        // Twelve five-minute cycles inside one hour, then one more after it.
        for i in 0..12 {
            let at = t0 + Duration::minutes(5 * i);
            let report = service
                .append_history(&[opportunity("OKX", "BTC", 1.0 + i as f64, at)], at)
                .await;
            assert_eq!(report.failed, 0);
        }
        let later = t0 + Duration::minutes(65);
        let _ = service
            .append_history(&[opportunity("OKX", "BTC", 50.0, later)], later)
            .await;

        let Ok(points) = service.get_history("BTC", "OKX", None, 100).await else {
            panic!("history read failed");
        };
        assert_eq!(points.len(), 2);
        assert!((points[1].apr - 12.0).abs() < f64::EPSILON);
        for pair in points.windows(2) {
            assert!(pair[0].captured_at - pair[1].captured_at >= Duration::hours(1));
        }
    }

    #[tokio::test]
    async fn append_history_collapses_lock_periods_to_max_apr() {
        let service = service();
        let now = Utc::now();
        let flex = opportunity("OKX", "USDT", 4.0, now);
        let mut locked = flex.clone();
        locked.lock_period = Some("30d".to_string());
        locked.apr = 7.5;

        let report = service.append_history(&[flex, locked], now).await;
        assert_eq!(report.inserted, 1);

        let Ok(points) = service.get_history("usdt", "okx", None, 10).await else {
            panic!("history read failed");
        };
        assert_eq!(points.len(), 1);
        assert!((points[0].apr - 7.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn stored_reads_on_empty_store_are_empty() {
        let service = service();
        assert_eq!(service.get_latest_per_platform("BTC").await.map(|v| v.len()).ok(), Some(0));
        assert_eq!(service.get_top_across_snapshots(5).await.map(|v| v.len()).ok(), Some(0));
    }

    #[tokio::test]
    async fn latest_per_platform_uses_newest_snapshot() {
        let service = service();
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);
        let _ = service
            .save_snapshots(
                &[opportunity("OKX", "BTC", 1.0, t0), opportunity("Binance", "BTC", 3.0, t0)],
                t0,
            )
            .await;
        let _ = service.save_snapshots(&[opportunity("OKX", "BTC", 4.0, t1)], t1).await;

        let Ok(latest) = service.get_latest_per_platform("btc").await else {
            panic!("read failed");
        };
        let aprs: Vec<f64> = latest.iter().map(|s| s.opportunity.apr).collect();
        assert_eq!(aprs, vec![4.0, 3.0]);
    }

    #[tokio::test]
    async fn trend_uses_point_at_or_before_lookback() {
        let service = service();
        let now = Utc::now();
        let day_ago = now - Duration::hours(25);
        let _ = service
            .append_history(&[opportunity("OKX", "BTC", 4.0, day_ago)], day_ago)
            .await;
        let _ = service.append_history(&[opportunity("OKX", "BTC", 5.0, now)], now).await;

        let lookbacks = vec![
            ("24h".to_string(), Duration::hours(24)),
            ("7d".to_string(), Duration::days(7)),
        ];
        let Ok(report) = service.get_trend("BTC", "OKX", &lookbacks, now).await else {
            panic!("trend failed");
        };
        assert!((report.latest_apr - 5.0).abs() < f64::EPSILON);
        assert_eq!(report.windows[0].trend.direction, TrendDirection::Up);
        assert!((report.windows[0].trend.delta_pct - 25.0).abs() < 1e-9);
        assert_eq!(report.windows[1].trend.direction, TrendDirection::Flat);
        assert!(report.windows[1].reference_apr.is_none());
    }

    #[tokio::test]
    async fn trend_of_unknown_series_is_not_found() {
        let result = service()
            .get_trend("DOGE", "Nowhere", &[("24h".to_string(), Duration::hours(24))], Utc::now())
            .await;
        assert!(matches!(result, Err(GatewayError::SeriesNotFound { .. })));
    }

    #[tokio::test]
    async fn prune_with_zero_retention_keeps_everything() {
        let service = service();
        let old = Utc::now() - Duration::days(90);
        let _ = service.save_snapshots(&[opportunity("OKX", "BTC", 1.0, old)], old).await;
        assert_eq!(service.prune_snapshots(0, Utc::now()).await.ok(), Some(0));
        assert_eq!(service.prune_snapshots(30, Utc::now()).await.ok(), Some(1));
    }
}
