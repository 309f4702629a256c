//! In-memory implementation of the persistence layer.
//!
//! Used when persistence is disabled or the database is unreachable at
//! startup, and as the backend for tests. All collections live behind one
//! [`tokio::sync::RwLock`]; history upserts hold the write lock across the
//! find-then-write steps, so a series never gets two points per bucket.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{BulkInsertReport, YieldStore};
use crate::domain::{
    Alert, AlertId, HistoryPoint, HistoryQuery, HistoryWrite, Notification, NotificationId,
    OpportunityKey, Snapshot,
};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct Collections {
    snapshots: Vec<Snapshot>,
    history: Vec<HistoryPoint>,
    alerts: HashMap<AlertId, Alert>,
    notifications: Vec<Notification>,
}

/// Volatile store keeping every collection in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl YieldStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn is_healthy(&self) -> bool {
        true
    }

    async fn insert_snapshots(&self, snapshots: &[Snapshot]) -> Result<BulkInsertReport, GatewayError> {
        let mut inner = self.inner.write().await;
        inner.snapshots.extend_from_slice(snapshots);
        Ok(BulkInsertReport {
            inserted: snapshots.len(),
            failed: 0,
        })
    }

    async fn latest_snapshots(&self) -> Result<Vec<Snapshot>, GatewayError> {
        let inner = self.inner.read().await;
        let mut latest: HashMap<OpportunityKey, &Snapshot> = HashMap::new();
        for snapshot in &inner.snapshots {
            latest
                .entry(snapshot.opportunity.dedup_key())
                .and_modify(|current| {
                    if snapshot.fetched_at >= current.fetched_at {
                        *current = snapshot;
                    }
                })
                .or_insert(snapshot);
        }
        Ok(latest.into_values().cloned().collect())
    }

    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64, GatewayError> {
        let mut inner = self.inner.write().await;
        let before = inner.snapshots.len();
        inner.snapshots.retain(|s| s.fetched_at >= cutoff);
        Ok((before - inner.snapshots.len()) as u64)
    }

    async fn upsert_history_point(
        &self,
        point: &HistoryPoint,
        window: Duration,
    ) -> Result<HistoryWrite, GatewayError> {
        let mut guard = self.inner.write().await;
        let history = &mut guard.history;
        let series = point.series_key();
        let window_start = point.captured_at - window;

        // Step 1: latest point of the series inside the window.
        let existing = history
            .iter()
            .enumerate()
            .filter(|(_, p)| p.series_key() == series && p.captured_at > window_start)
            .max_by_key(|(_, p)| p.captured_at)
            .map(|(idx, _)| idx);

        // Step 2: refresh in place, or insert.
        match existing.and_then(|idx| history.get_mut(idx)) {
            Some(current) => {
                current.apr = point.apr;
                current.apy = point.apy;
                current.source.clone_from(&point.source);
                Ok(HistoryWrite::Updated)
            }
            None => {
                history.push(point.clone());
                Ok(HistoryWrite::Inserted)
            }
        }
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryPoint>, GatewayError> {
        let inner = self.inner.read().await;
        let mut points: Vec<HistoryPoint> = inner
            .history
            .iter()
            .filter(|p| p.series_key() == query.series)
            .filter(|p| query.since.is_none_or(|since| p.captured_at >= since))
            .filter(|p| query.until.is_none_or(|until| p.captured_at <= until))
            .cloned()
            .collect();
        points.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        points.truncate(query.limit);
        Ok(points)
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), GatewayError> {
        self.inner.write().await.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<Alert>, GatewayError> {
        let inner = self.inner.read().await;
        let mut alerts: Vec<Alert> = inner
            .alerts
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    async fn active_alerts(&self) -> Result<Vec<Alert>, GatewayError> {
        let inner = self.inner.read().await;
        Ok(inner.alerts.values().filter(|a| a.is_active).cloned().collect())
    }

    async fn set_alert_active(
        &self,
        id: AlertId,
        user_id: &str,
        is_active: bool,
    ) -> Result<Alert, GatewayError> {
        let mut inner = self.inner.write().await;
        let alert = inner
            .alerts
            .get_mut(&id)
            .filter(|a| a.user_id == user_id)
            .ok_or(GatewayError::AlertNotFound(*id.as_uuid()))?;
        alert.is_active = is_active;
        Ok(alert.clone())
    }

    async fn claim_alert_trigger(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
        cooldown: Duration,
        notification: &Notification,
    ) -> Result<bool, GatewayError> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let Some(alert) = inner
            .alerts
            .get_mut(&id)
            .filter(|a| a.is_active && !a.is_on_cooldown(at, cooldown))
        else {
            return Ok(false);
        };
        alert.last_triggered = Some(at);
        inner.notifications.push(notification.clone());
        Ok(true)
    }

    async fn delete_alert(&self, id: AlertId, user_id: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.write().await;
        let owned = inner.alerts.get(&id).is_some_and(|a| a.user_id == user_id);
        if !owned {
            return Err(GatewayError::AlertNotFound(*id.as_uuid()));
        }
        inner.alerts.remove(&id);
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        self.inner.write().await.notifications.push(notification.clone());
        Ok(())
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, GatewayError> {
        let inner = self.inner.read().await;
        let mut list: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(list)
    }

    async fn set_notification_read(
        &self,
        id: NotificationId,
        user_id: &str,
        read: bool,
    ) -> Result<Notification, GatewayError> {
        let mut inner = self.inner.write().await;
        let notification = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .ok_or(GatewayError::NotificationNotFound(*id.as_uuid()))?;
        notification.read = read;
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, GatewayError> {
        let mut inner = self.inner.write().await;
        let mut count = 0;
        for n in inner
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.read)
        {
            n.read = true;
            count += 1;
        }
        Ok(count)
    }

    async fn delete_notification(&self, id: NotificationId, user_id: &str) -> Result<(), GatewayError> {
        let mut inner = self.inner.write().await;
        let before = inner.notifications.len();
        inner
            .notifications
            .retain(|n| !(n.id == id && n.user_id == user_id));
        if inner.notifications.len() == before {
            return Err(GatewayError::NotificationNotFound(*id.as_uuid()));
        }
        Ok(())
    }
}
