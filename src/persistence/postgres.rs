//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::{AlertRow, HistoryRow, NotificationRow, SnapshotRow};
use super::{BulkInsertReport, YieldStore};
use crate::config::GatewayConfig;
use crate::domain::{
    Alert, AlertId, HistoryPoint, HistoryQuery, HistoryWrite, Notification, NotificationId,
    Snapshot,
};
use crate::error::GatewayError;

const SNAPSHOT_COLUMNS: &str = "id, platform, asset, symbol, platform_type, chain, apr, apy, \
     lock_period, min_stake, risk_level, source, last_updated, fetched_at";

/// Rows per multi-row snapshot insert; 14 binds each stays well under the
/// 65 535 parameter limit.
const SNAPSHOT_BATCH_ROWS: usize = 1_000;

const ALERT_COLUMNS: &str =
    "id, user_id, asset, platform, alert_type, threshold, is_active, created_at, last_triggered";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, kind, read, created_at, alert_id";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool sized from `config` and applies the migrations.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceUnavailable`] if the database
    /// cannot be reached, or a migration error.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(std::time::Duration::from_secs(
                config.database_connect_timeout_secs,
            ))
            .connect(&config.database_url)
            .await
            .map_err(|e| GatewayError::PersistenceUnavailable(e.to_string()))?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Applies the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    /// Per-row fallback after a batch was rejected, so one bad row only
    /// costs itself.
    async fn insert_snapshots_one_by_one(
        &self,
        snapshots: &[Snapshot],
    ) -> Result<BulkInsertReport, GatewayError> {
        let mut report = BulkInsertReport::default();
        for snapshot in snapshots {
            match self.insert_snapshot(snapshot).await.map_err(GatewayError::from) {
                Ok(()) => report.inserted += 1,
                Err(e @ GatewayError::PersistenceUnavailable(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        platform = %snapshot.opportunity.platform,
                        symbol = %snapshot.opportunity.symbol,
                        error = %e,
                        "snapshot insert failed"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Result<(), sqlx::Error> {
        let opp = &snapshot.opportunity;
        sqlx::query(
            "INSERT INTO snapshots (id, platform, asset, symbol, platform_type, chain, apr, apy, \
             lock_period, min_stake, risk_level, source, last_updated, fetched_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(snapshot.id)
        .bind(&opp.platform)
        .bind(&opp.asset)
        .bind(&opp.symbol)
        .bind(opp.platform_type.as_str())
        .bind(&opp.chain)
        .bind(opp.apr)
        .bind(opp.apy)
        .bind(opp.lock_period.as_deref())
        .bind(opp.min_stake)
        .bind(opp.risk_level.map(|r| r.as_str()))
        .bind(&opp.source)
        .bind(opp.last_updated)
        .bind(snapshot.fetched_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl YieldStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn is_healthy(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    async fn insert_snapshots(&self, snapshots: &[Snapshot]) -> Result<BulkInsertReport, GatewayError> {
        let mut report = BulkInsertReport::default();
        for batch in snapshots.chunks(SNAPSHOT_BATCH_ROWS) {
            match snapshot_batch_insert(batch).build().execute(&self.pool).await {
                Ok(done) => {
                    let inserted = usize::try_from(done.rows_affected()).unwrap_or(batch.len());
                    report.inserted += inserted;
                    report.failed += batch.len().saturating_sub(inserted);
                }
                Err(e) => match GatewayError::from(e) {
                    e @ GatewayError::PersistenceUnavailable(_) => return Err(e),
                    e => {
                        tracing::warn!(rows = batch.len(), error = %e, "batch snapshot insert failed, retrying per row");
                        let retried = self.insert_snapshots_one_by_one(batch).await?;
                        report.inserted += retried.inserted;
                        report.failed += retried.failed;
                    }
                },
            }
        }
        Ok(report)
    }

    async fn latest_snapshots(&self) -> Result<Vec<Snapshot>, GatewayError> {
        let sql = format!(
            "SELECT DISTINCT ON (lower(platform), upper(symbol), lower(coalesce(lock_period, 'flex'))) \
             {SNAPSHOT_COLUMNS} FROM snapshots \
             ORDER BY lower(platform), upper(symbol), lower(coalesce(lock_period, 'flex')), fetched_at DESC"
        );
        let rows = sqlx::query_as::<_, SnapshotRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Snapshot::try_from).collect()
    }

    async fn delete_snapshots_before(&self, cutoff: DateTime<Utc>) -> Result<u64, GatewayError> {
        let result = sqlx::query("DELETE FROM snapshots WHERE fetched_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_history_point(
        &self,
        point: &HistoryPoint,
        window: Duration,
    ) -> Result<HistoryWrite, GatewayError> {
        let series = point.series_key();
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent writers of the same series until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("apr_history:{}:{}", series.platform, series.asset))
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_scalar::<_, uuid::Uuid>(
            "SELECT id FROM apr_history \
             WHERE lower(platform) = $1 AND upper(asset) = $2 AND captured_at > $3 \
             ORDER BY captured_at DESC LIMIT 1",
        )
        .bind(&series.platform)
        .bind(&series.asset)
        .bind(point.captured_at - window)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = if let Some(id) = existing {
            sqlx::query("UPDATE apr_history SET apr = $2, apy = $3, source = $4 WHERE id = $1")
                .bind(id)
                .bind(point.apr)
                .bind(point.apy)
                .bind(&point.source)
                .execute(&mut *tx)
                .await?;
            HistoryWrite::Updated
        } else {
            sqlx::query(
                "INSERT INTO apr_history (id, platform, asset, symbol, apr, apy, source, captured_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(point.id)
            .bind(&point.platform)
            .bind(&point.asset)
            .bind(&point.symbol)
            .bind(point.apr)
            .bind(point.apy)
            .bind(&point.source)
            .bind(point.captured_at)
            .execute(&mut *tx)
            .await?;
            HistoryWrite::Inserted
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn history(&self, query: &HistoryQuery) -> Result<Vec<HistoryPoint>, GatewayError> {
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, HistoryRow>(
            "SELECT id, platform, asset, symbol, apr, apy, source, captured_at FROM apr_history \
             WHERE lower(platform) = $1 AND upper(asset) = $2 \
             AND ($3::timestamptz IS NULL OR captured_at >= $3) \
             AND ($4::timestamptz IS NULL OR captured_at <= $4) \
             ORDER BY captured_at DESC LIMIT $5",
        )
        .bind(&query.series.platform)
        .bind(&query.series.asset)
        .bind(query.since)
        .bind(query.until)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HistoryPoint::from).collect())
    }

    async fn insert_alert(&self, alert: &Alert) -> Result<(), GatewayError> {
        sqlx::query(
            "INSERT INTO alerts (id, user_id, asset, platform, alert_type, threshold, is_active, \
             created_at, last_triggered) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(alert.id.as_uuid())
        .bind(&alert.user_id)
        .bind(&alert.asset)
        .bind(&alert.platform)
        .bind(alert.alert_type.as_str())
        .bind(alert.threshold)
        .bind(alert.is_active)
        .bind(alert.created_at)
        .bind(alert.last_triggered)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn alerts_for_user(&self, user_id: &str) -> Result<Vec<Alert>, GatewayError> {
        let sql =
            format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE user_id = $1 ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn active_alerts(&self) -> Result<Vec<Alert>, GatewayError> {
        let sql = format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE is_active");
        let rows = sqlx::query_as::<_, AlertRow>(&sql)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Alert::try_from).collect()
    }

    async fn set_alert_active(
        &self,
        id: AlertId,
        user_id: &str,
        is_active: bool,
    ) -> Result<Alert, GatewayError> {
        let sql = format!(
            "UPDATE alerts SET is_active = $3 WHERE id = $1 AND user_id = $2 RETURNING {ALERT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, AlertRow>(&sql)
            .bind(id.as_uuid())
            .bind(user_id)
            .bind(is_active)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::AlertNotFound(*id.as_uuid()))?;
        Alert::try_from(row)
    }

    async fn claim_alert_trigger(
        &self,
        id: AlertId,
        at: DateTime<Utc>,
        cooldown: Duration,
        notification: &Notification,
    ) -> Result<bool, GatewayError> {
        // `None` means the cooldown reaches past the calendar: only a
        // never-triggered alert can fire.
        let ready_before: Option<DateTime<Utc>> = at.checked_sub_signed(cooldown);
        let mut tx = self.pool.begin().await?;

        // The row lock taken by the UPDATE makes a concurrent claim wait
        // and then re-check the cooldown against the committed value.
        let claimed = sqlx::query(
            "UPDATE alerts SET last_triggered = $2 \
             WHERE id = $1 AND is_active \
               AND (last_triggered IS NULL OR last_triggered <= $3::timestamptz)",
        )
        .bind(id.as_uuid())
        .bind(at)
        .bind(ready_before)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            return Ok(false);
        }

        notification_insert(notification).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn delete_alert(&self, id: AlertId, user_id: &str) -> Result<(), GatewayError> {
        let result = sqlx::query("DELETE FROM alerts WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::AlertNotFound(*id.as_uuid()));
        }
        Ok(())
    }

    async fn insert_notification(&self, notification: &Notification) -> Result<(), GatewayError> {
        notification_insert(notification).execute(&self.pool).await?;
        Ok(())
    }

    async fn notifications_for_user(
        &self,
        user_id: &str,
        unread_only: bool,
    ) -> Result<Vec<Notification>, GatewayError> {
        let sql = format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications \
             WHERE user_id = $1 AND (NOT $2 OR NOT read) ORDER BY created_at DESC"
        );
        let rows = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(user_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }

    async fn set_notification_read(
        &self,
        id: NotificationId,
        user_id: &str,
        read: bool,
    ) -> Result<Notification, GatewayError> {
        let sql = format!(
            "UPDATE notifications SET read = $3 WHERE id = $1 AND user_id = $2 \
             RETURNING {NOTIFICATION_COLUMNS}"
        );
        let row = sqlx::query_as::<_, NotificationRow>(&sql)
            .bind(id.as_uuid())
            .bind(user_id)
            .bind(read)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(GatewayError::NotificationNotFound(*id.as_uuid()))?;
        Ok(Notification::from(row))
    }

    async fn mark_all_notifications_read(&self, user_id: &str) -> Result<u64, GatewayError> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn delete_notification(&self, id: NotificationId, user_id: &str) -> Result<(), GatewayError> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
            .bind(id.as_uuid())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::NotificationNotFound(*id.as_uuid()));
        }
        Ok(())
    }
}

fn notification_insert(notification: &Notification) -> Query<'_, Postgres, PgArguments> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, title, message, kind, read, created_at, alert_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(notification.id.as_uuid())
    .bind(&notification.user_id)
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.kind)
    .bind(notification.read)
    .bind(notification.created_at)
    .bind(notification.alert_id.map(|a| *a.as_uuid()))
}

/// One multi-row `INSERT` for a batch of snapshots.
fn snapshot_batch_insert(snapshots: &[Snapshot]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(format!("INSERT INTO snapshots ({SNAPSHOT_COLUMNS}) "));
    builder.push_values(snapshots, |mut row, snapshot| {
        let opp = &snapshot.opportunity;
        row.push_bind(snapshot.id)
            .push_bind(&opp.platform)
            .push_bind(&opp.asset)
            .push_bind(&opp.symbol)
            .push_bind(opp.platform_type.as_str())
            .push_bind(&opp.chain)
            .push_bind(opp.apr)
            .push_bind(opp.apy)
            .push_bind(opp.lock_period.as_deref())
            .push_bind(opp.min_stake)
            .push_bind(opp.risk_level.map(|r| r.as_str()))
            .push_bind(&opp.source)
            .push_bind(opp.last_updated)
            .push_bind(snapshot.fetched_at);
    });
    builder.push(" ON CONFLICT (id) DO NOTHING");
    builder
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::opportunity::fixtures::opportunity;

    #[test]
    fn batch_insert_is_one_statement() {
        let now = Utc::now();
        let batch = [
            Snapshot::new(opportunity("OKX", "BTC", 5.0, now), now),
            Snapshot::new(opportunity("OKX", "ETH", 3.0, now), now),
            Snapshot::new(opportunity("Binance", "USDT", 4.0, now), now),
        ];
        let mut builder = snapshot_batch_insert(&batch);
        let sql = builder.sql();
        assert!(sql.starts_with("INSERT INTO snapshots (id, platform"));
        assert_eq!(sql.matches("VALUES").count(), 1);
        assert!(sql.contains("$42"));
        assert!(!sql.contains("$43"));
        assert!(sql.ends_with("ON CONFLICT (id) DO NOTHING"));
        let _ = builder.build();
    }
}
