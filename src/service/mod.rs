//! Service layer: business logic orchestration.
//!
//! [`HistoryService`] owns snapshot and history persistence plus trend
//! reads, [`AlertService`] evaluates thresholds against live rates,
//! [`NotificationService`] manages a user's inbox, and [`SyncService`]
//! chains them into the periodic pipeline driven by [`SyncScheduler`].

pub mod alert_service;
pub mod history_service;
pub mod notification_service;
pub mod sync_service;

pub use alert_service::AlertService;
pub use history_service::{HistoryAppendReport, HistoryService};
pub use notification_service::NotificationService;
pub use sync_service::{SchedulerStatus, SyncOutcome, SyncReport, SyncScheduler, SyncService};
