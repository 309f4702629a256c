//! Domain layer: yield records, history, trends, alerts, and events.
//!
//! This module contains the server-side domain model: the normalized
//! [`Opportunity`] every source produces, persisted snapshots and history
//! points, trend math, threshold alerts with their live-rate lookup,
//! notifications, and the event bus that broadcasts pipeline events.

pub mod alert;
pub mod event_bus;
pub mod gateway_event;
pub mod history;
pub mod ids;
pub mod notification;
pub mod opportunity;
pub mod trend;

pub use alert::{Alert, AlertType, LiveRates, rate_key};
pub use event_bus::EventBus;
pub use gateway_event::GatewayEvent;
pub use history::{HistoryPoint, HistoryQuery, HistoryWrite, SeriesKey, Snapshot};
pub use ids::{AlertId, NotificationId};
pub use notification::Notification;
pub use opportunity::{Opportunity, OpportunityKey, PlatformType, RiskLevel};
pub use trend::{
    Trend, TrendDirection, TrendReport, TrendWindow, compute_trend, parse_lookback, select_reference,
};
