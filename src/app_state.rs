//! Shared application state injected into all Axum handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::GatewayConfig;
use crate::domain::EventBus;
use crate::persistence::YieldStore;
use crate::service::{AlertService, HistoryService, NotificationService, SyncScheduler, SyncService};
use crate::sources::{AggregationRegistry, YieldSource};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Live aggregation over every configured source.
    pub registry: AggregationRegistry,
    /// Snapshot, history and trend operations.
    pub history_service: Arc<HistoryService>,
    /// Alert management and evaluation.
    pub alert_service: Arc<AlertService>,
    /// Notification inbox.
    pub notification_service: Arc<NotificationService>,
    /// Recurring sync timer; also exposes the sync service.
    pub scheduler: Arc<SyncScheduler>,
    /// Event bus for WebSocket subscriptions.
    pub event_bus: EventBus,
    /// Backing store, for health reporting.
    pub store: Arc<dyn YieldStore>,
    /// Admin shared secret. `None` rejects every admin call.
    pub cron_secret: Option<Arc<str>>,
    /// Default scheduler interval.
    pub sync_interval: Duration,
}

impl AppState {
    /// Wires the service graph from configuration, a store, and sources.
    #[must_use]
    pub fn new(
        config: &GatewayConfig,
        store: Arc<dyn YieldStore>,
        sources: Vec<Arc<dyn YieldSource>>,
    ) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let registry = AggregationRegistry::new(sources, config.source_timeout);

        let history_service = HistoryService::new(Arc::clone(&store), config.history_bucket);
        let alert_service =
            AlertService::new(Arc::clone(&store), event_bus.clone(), config.alert_cooldown);
        let notification_service = NotificationService::new(Arc::clone(&store));

        let sync_service = Arc::new(SyncService::new(
            registry.clone(),
            history_service.clone(),
            alert_service.clone(),
            event_bus.clone(),
            config.snapshot_retention_days,
        ));

        Self {
            registry,
            history_service: Arc::new(history_service),
            alert_service: Arc::new(alert_service),
            notification_service: Arc::new(notification_service),
            scheduler: Arc::new(SyncScheduler::new(sync_service)),
            event_bus,
            store,
            cron_secret: config.cron_secret.as_deref().map(Arc::from),
            sync_interval: config.sync_interval,
        }
    }

    /// The sync pipeline driven by the scheduler.
    #[must_use]
    pub fn sync_service(&self) -> &Arc<SyncService> {
        self.scheduler.service()
    }
}
