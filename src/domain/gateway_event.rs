//! Domain events emitted by the sync pipeline.
//!
//! Every completed sync cycle, source failure and new notification is
//! published as a [`GatewayEvent`] through the [`super::EventBus`] and
//! forwarded to WebSocket subscribers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::Notification;

/// Domain event broadcast to WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Emitted after a sync cycle finished.
    SyncCompleted {
        /// Cycle identifier, also used in log lines.
        cycle_id: uuid::Uuid,
        /// Opportunities returned by the registry after dedup.
        fetched: usize,
        /// Snapshot rows persisted.
        snapshots_saved: usize,
        /// New history points.
        history_inserted: usize,
        /// History points refreshed inside their bucket.
        history_updated: usize,
        /// Notifications produced by alert evaluation.
        notifications: usize,
        /// Wall-clock duration of the cycle.
        duration_ms: u64,
        /// Completion timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when a source failed or timed out during aggregation.
    SourceFailed {
        /// Source name.
        source_name: String,
        /// Failure reason.
        reason: String,
        /// Failure timestamp.
        timestamp: DateTime<Utc>,
    },

    /// Emitted when an alert produced a notification.
    NotificationCreated {
        /// Recipient.
        user_id: String,
        /// The stored notification.
        notification: Notification,
        /// Creation timestamp.
        timestamp: DateTime<Utc>,
    },
}

impl GatewayEvent {
    /// Returns the user this event is addressed to, or `None` for
    /// broadcast events.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::NotificationCreated { user_id, .. } => Some(user_id),
            Self::SyncCompleted { .. } | Self::SourceFailed { .. } => None,
        }
    }

    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn event_type_str(&self) -> &'static str {
        match self {
            Self::SyncCompleted { .. } => "sync_completed",
            Self::SourceFailed { .. } => "source_failed",
            Self::NotificationCreated { .. } => "notification_created",
        }
    }
}
