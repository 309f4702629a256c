//! DTOs for admin endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Notification;
use crate::service::{SchedulerStatus, SyncOutcome, SyncReport};

/// Outcome label of a manual sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// The cycle ran.
    Completed,
    /// Another cycle was in flight.
    Skipped,
}

/// Response of `POST /admin/sync`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncResponse {
    /// Whether the cycle ran.
    pub status: SyncStatus,
    /// Cycle report when it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<SyncReport>,
}

impl From<SyncOutcome> for SyncResponse {
    fn from(outcome: SyncOutcome) -> Self {
        match outcome {
            SyncOutcome::Completed(report) => Self {
                status: SyncStatus::Completed,
                report: Some(report),
            },
            SyncOutcome::Skipped => Self {
                status: SyncStatus::Skipped,
                report: None,
            },
        }
    }
}

/// Response of `POST /admin/alerts/evaluate`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EvaluateResponse {
    /// Notifications produced.
    pub count: usize,
    /// The notifications.
    pub data: Vec<Notification>,
}

/// Optional body for `POST /admin/scheduler/start`.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct StartSchedulerRequest {
    /// Tick interval override in seconds.
    pub interval_secs: Option<u64>,
}

/// Response of scheduler control endpoints.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerActionResponse {
    /// `false` when the call was a no-op.
    pub changed: bool,
    /// State after the call.
    pub status: SchedulerStatus,
}
