//! Persistence layer: snapshots, history series, alerts, notifications.
//!
//! Provides the [`YieldStore`] trait for durable storage of sync-cycle
//! snapshots, the down-sampled APR history, and user alerts and
//! notifications. Two implementations exist: [`PostgresStore`] backed by
//! `sqlx::PgPool`, and [`MemoryStore`] used in degraded mode and in tests.

#[cfg(test)]
pub(crate) mod faulty;
pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::config::GatewayConfig;
use crate::domain::{
    Alert, AlertId, HistoryPoint, HistoryQuery, HistoryWrite, Notification, NotificationId,
    Snapshot,
};
use crate::error::GatewayError;

pub use memory::MemoryStore;
pub use models::BulkInsertReport;
pub use postgres::PostgresStore;

/// Document-style store consumed by the service layer.
///
/// User-scoped mutations take the caller's `user_id` and report
/// not-found when the record belongs to someone else.
#[async_trait]
pub trait YieldStore: Send + Sync + fmt::Debug {
    /// Short backend name for health output (`"postgres"`, `"memory"`).
    fn backend(&self) -> &'static str;

    /// Returns `true` when the backend answers a trivial query.
    async fn is_healthy(&self) -> bool;

    // ── Snapshots ───────────────────────────────────────────────────────

    /// Appends snapshots. Rows are written independently: a failing row is
    /// counted and logged without blocking the others.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceUnavailable`] when the backend
    /// cannot be reached at all.
    async fn insert_snapshots(&self, snapshots: &[Snapshot]) -> Result<BulkInsertReport, GatewayError>;

    /// Returns the most recent snapshot per `(platform, symbol, lock_period)`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn latest_snapshots(&self) -> Result<Vec<Snapshot>, GatewayError>;

    /// Deletes snapshots fetched before `cutoff`, returning the count.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64, GatewayError>;

    // ── History ─────────────────────────────────────────────────────────

    /// Writes `point` into its series with bucket semantics:
    ///
    /// 1. find the latest point of the series captured within `window`
    ///    before `point.captured_at`;
    /// 2. if present, overwrite its `apr`, `apy` and `source`;
    /// 3. otherwise insert `point`.
    ///
    /// The two steps run atomically per series.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn upsert_history_point(
        &self,
        point: &HistoryPoint,
        window: Duration,
    ) -> Result<HistoryWrite, GatewayError>;

    /// Reads a series newest first, capped at `query.limit`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryPoint>, GatewayError>;

    // ── Alerts ──────────────────────────────────────────────────────────

    /// Stores a new alert.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn insert_alert(&self, alert: &Alert) -> Result<(), GatewayError>;

    /// Lists a user's alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<Alert>, GatewayError>;

    /// Lists every alert with `is_active == true`.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn active_alerts(&self) -> Result<Vec<Alert>, GatewayError>;

    /// Sets `is_active` on a user's alert and returns the updated alert.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlertNotFound`] if the alert does not exist
    /// for `user_id`.
    async fn set_alert_active(
        &self,
        id: AlertId,
        user_id: &str,
        is_active: bool,
    ) -> Result<Alert, GatewayError>;

    /// Atomically claims a trigger of an active alert and stores its
    /// notification.
    ///
    /// The claim succeeds only if the alert is still active and its
    /// `last_triggered` is unset or at least `cooldown` before `at`; then
    /// `last_triggered` becomes `at` and `notification` is stored in the
    /// same step. Returns `false` when another evaluation got there first
    /// or the alert is gone, in which case nothing is written.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure; neither write is
    /// applied then.
    async fn claim_alert_trigger(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
        cooldown: Duration,
        notification: &Notification,
    ) -> Result<bool, GatewayError>;

    /// Deletes a user's alert. Notifications it produced are kept.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlertNotFound`] if the alert does not exist
    /// for `user_id`.
    async fn delete_alert(&self, id: AlertId, user_id: &str) -> Result<(), GatewayError>;

    // ── Notifications ───────────────────────────────────────────────────

    /// Stores a notification.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn insert_notification(&self, notification: &Notification) -> Result<(), GatewayError>;

    /// Lists a user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, GatewayError>;

    /// Sets the read flag of a user's notification.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotificationNotFound`] if it does not exist
    /// for `user_id`.
    async fn set_notification_read(
        &self,
        id: NotificationId,
        user_id: &str,
        read: bool,
    ) -> Result<Notification, GatewayError>;

    /// Marks every unread notification of a user as read, returning the count.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on backend failure.
    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, GatewayError>;

    /// Deletes a user's notification.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotificationNotFound`] if it does not exist
    /// for `user_id`.
    async fn delete_notification(&self, id: NotificationId, user_id: &str) -> Result<(), GatewayError>;
}

/// Selects the store for this process.
///
/// Uses PostgreSQL when persistence is enabled and reachable; otherwise
/// logs the reason and falls back to a fresh [`MemoryStore`].
pub async fn open_store(config: &GatewayConfig) -> Arc<dyn YieldStore> {
    if !config.persistence_enabled {
        tracing::info!("persistence disabled, using in-memory store");
        return Arc::new(MemoryStore::new());
    }
    match PostgresStore::connect(config).await {
        Ok(store) => {
            tracing::info!("connected to postgres");
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "postgres unavailable, falling back to in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}
