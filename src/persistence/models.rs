//! Database row models and their conversions into domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{
    Alert, AlertId, AlertType, HistoryPoint, Notification, NotificationId, Opportunity,
    PlatformType, RiskLevel, Snapshot,
};
use crate::error::GatewayError;

/// Outcome of an unordered bulk insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BulkInsertReport {
    /// Rows written.
    pub inserted: usize,
    /// Rows rejected by the backend.
    pub failed: usize,
}

/// A row of the `snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SnapshotRow {
    /// Row ID.
    pub id: Uuid,
    /// Platform display name.
    pub platform: String,
    /// Canonical asset.
    pub asset: String,
    /// Listing symbol.
    pub symbol: String,
    /// `exchange` or `defi`.
    pub platform_type: String,
    /// Chain name.
    pub chain: String,
    /// APR in percent.
    pub apr: f64,
    /// APY in percent.
    pub apy: Option<f64>,
    /// Lock period label.
    pub lock_period: Option<String>,
    /// Minimum stake.
    pub min_stake: Option<f64>,
    /// `low`, `medium` or `high`.
    pub risk_level: Option<String>,
    /// Source name.
    pub source: String,
    /// Source-side update time.
    pub last_updated: DateTime<Utc>,
    /// Fetch time of the sync cycle.
    pub fetched_at: DateTime<Utc>,
}

impl TryFrom<SnapshotRow> for Snapshot {
    type Error = GatewayError;

    fn try_from(row: SnapshotRow) -> Result<Self, Self::Error> {
        let platform_type = row
            .platform_type
            .parse::<PlatformType>()
            .map_err(GatewayError::PersistenceError)?;
        let risk_level = row
            .risk_level
            .as_deref()
            .map(str::parse::<RiskLevel>)
            .transpose()
            .map_err(GatewayError::PersistenceError)?;

        Ok(Self {
            id: row.id,
            opportunity: Opportunity {
                platform: row.platform,
                asset: row.asset,
                symbol: row.symbol,
                platform_type,
                chain: row.chain,
                apr: row.apr,
                apy: row.apy,
                lock_period: row.lock_period,
                min_stake: row.min_stake,
                risk_level,
                source: row.source,
                last_updated: row.last_updated,
            },
            fetched_at: row.fetched_at,
        })
    }
}

/// A row of the `apr_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRow {
    /// Row ID.
    pub id: Uuid,
    /// Platform display name.
    pub platform: String,
    /// Canonical asset.
    pub asset: String,
    /// Listing symbol.
    pub symbol: String,
    /// APR in percent.
    pub apr: f64,
    /// APY in percent.
    pub apy: f64,
    /// Source name.
    pub source: String,
    /// Bucket start.
    pub captured_at: DateTime<Utc>,
}

impl From<HistoryRow> for HistoryPoint {
    fn from(row: HistoryRow) -> Self {
        Self {
            id: row.id,
            platform: row.platform,
            asset: row.asset,
            symbol: row.symbol,
            apr: row.apr,
            apy: row.apy,
            source: row.source,
            captured_at: row.captured_at,
        }
    }
}

/// A row of the `alerts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRow {
    /// Row ID.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Asset ticker.
    pub asset: String,
    /// Platform display name.
    pub platform: String,
    /// `above` or `below`.
    pub alert_type: String,
    /// Threshold APR.
    pub threshold: f64,
    /// Active flag.
    pub is_active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last trigger time.
    pub last_triggered: Option<DateTime<Utc>>,
}

impl TryFrom<AlertRow> for Alert {
    type Error = GatewayError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AlertId::from_uuid(row.id),
            user_id: row.user_id,
            asset: row.asset,
            platform: row.platform,
            alert_type: row
                .alert_type
                .parse::<AlertType>()
                .map_err(GatewayError::PersistenceError)?,
            threshold: row.threshold,
            is_active: row.is_active,
            created_at: row.created_at,
            last_triggered: row.last_triggered,
        })
    }
}

/// A row of the `notifications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    /// Row ID.
    pub id: Uuid,
    /// Recipient.
    pub user_id: String,
    /// Headline.
    pub title: String,
    /// Body.
    pub message: String,
    /// Kind discriminator.
    pub kind: String,
    /// Read flag.
    pub read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Originating alert.
    pub alert_id: Option<Uuid>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: NotificationId::from_uuid(row.id),
            user_id: row.user_id,
            title: row.title,
            message: row.message,
            kind: row.kind,
            read: row.read,
            created_at: row.created_at,
            alert_id: row.alert_id.map(AlertId::from_uuid),
        }
    }
}
