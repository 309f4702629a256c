//! Fault-injecting wrapper around [`MemoryStore`] for service tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{BulkInsertReport, MemoryStore, YieldStore};
use crate::domain::{
    Alert, AlertId, HistoryPoint, HistoryQuery, HistoryWrite, Notification, NotificationId,
    Snapshot,
};
use crate::error::GatewayError;

/// Delegates to an inner [`MemoryStore`] except where a switch is set.
#[derive(Debug, Default)]
pub(crate) struct FaultyStore {
    pub inner: MemoryStore,
    /// Snapshot rows whose symbol matches are rejected and counted as failed.
    pub reject_snapshot_symbol: Option<String>,
    /// Snapshot inserts fail as a whole with `PersistenceUnavailable`.
    pub snapshots_unavailable: bool,
    /// Trigger claims fail with a backend error.
    pub fail_trigger_claims: bool,
    /// Yield to the scheduler after reading active alerts, so concurrent
    /// evaluations interleave between read and claim.
    pub yield_after_alert_read: bool,
}

#[async_trait]
impl YieldStore for FaultyStore {
    fn backend(&self) -> &'static str {
        "faulty"
    }

    async fn is_healthy(&self) -> bool {
        !self.snapshots_unavailable
    }

    async fn insert_snapshots(&self, snapshots: &[Snapshot]) -> Result<BulkInsertReport, GatewayError> {
        if self.snapshots_unavailable {
            return Err(GatewayError::PersistenceUnavailable("connection refused".to_string()));
        }
        let Some(rejected) = self.reject_snapshot_symbol.as_deref() else {
            return self.inner.insert_snapshots(snapshots).await;
        };
        let (bad, good): (Vec<Snapshot>, Vec<Snapshot>) = snapshots
            .iter()
            .cloned()
            .partition(|s| s.opportunity.symbol == rejected);
        let mut report = self.inner.insert_snapshots(&good).await?;
        report.failed += bad.len();
        Ok(report)
    }

    async fn latest_snapshots(&self) -> Result<Vec<Snapshot>, GatewayError> {
        self.inner.latest_snapshots().await
    }

    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64, GatewayError> {
        self.inner.delete_snapshots_before(cutoff).await
    }

    async fn upsert_history_point(
        &self,
        point: &HistoryPoint,
        window: Duration,
    ) -> Result<HistoryWrite, GatewayError> {
        self.inner.upsert_history_point(point, window).await
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryPoint>, GatewayError> {
        self.inner.history(query).await
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), GatewayError> {
        self.inner.insert_alert(alert).await
    }

    async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<Alert>, GatewayError> {
        self.inner.alerts_for_user(user_id).await
    }

    async fn active_alerts(&self) -> Result<Vec<Alert>, GatewayError> {
        let alerts = self.inner.active_alerts().await;
        if self.yield_after_alert_read {
            tokio::task::yield_now().await;
        }
        alerts
    }

    async fn set_alert_active(
        &self,
        id: AlertId,
        user_id: &str,
        is_active: bool,
    ) -> Result<Alert, GatewayError> {
        self.inner.set_alert_active(id, user_id, is_active).await
    }

    async fn claim_alert_trigger(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
        cooldown: Duration,
        notification: &Notification,
    ) -> Result<bool, GatewayError> {
        if self.fail_trigger_claims {
            return Err(GatewayError::PersistenceError("disk full".to_string()));
        }
        self.inner.claim_alert_trigger(id, at, cooldown, notification).await
    }

    async fn delete_alert(&self, id: AlertId, user_id: &str) -> Result<(), GatewayError> {
        self.inner.delete_alert(id, user_id).await
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        self.inner.insert_notification(notification).await
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, GatewayError> {
        self.inner.notifications_for_user(user_id, unread_only).await
    }

    async fn set_notification_read(
        &self,
        id: NotificationId,
        user_id: &str,
        read: bool,
    ) -> Result<Notification, GatewayError> {
        self.inner.set_notification_read(id, user_id, read).await
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, GatewayError> {
        self.inner.mark_all_notifications_read(user_id).await
    }

    async fn delete_notification(&self, id: NotificationId, user_id: &str) -> Result<(), GatewayError> {
        self.inner.delete_notification(id, user_id).await
    }
}
