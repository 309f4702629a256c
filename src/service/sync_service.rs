//! Sync pipeline and its recurring scheduler.
//!
//! One sync cycle runs: aggregate all sources → save snapshots → append
//! history → evaluate alerts on the freshly fetched rates → prune old
//! snapshots. [`SyncService::run_sync_cycle`] is guarded by a single-flight
//! flag: a call made while another cycle is in flight returns
//! [`SyncOutcome::Skipped`] immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{AlertService, HistoryAppendReport, HistoryService};
use crate::domain::{EventBus, GatewayEvent, LiveRates, Notification};
use crate::error::GatewayError;
use crate::persistence::BulkInsertReport;
use crate::sources::AggregationRegistry;

/// Counts and timings of one completed sync cycle.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SyncReport {
    /// Cycle identifier.
    pub cycle_id: Uuid,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// Deduplicated opportunities fetched.
    pub fetched: usize,
    /// Sources that failed or timed out.
    pub failed_sources: Vec<String>,
    /// Snapshot insert counts.
    pub snapshots: BulkInsertReport,
    /// History append counts.
    pub history: HistoryAppendReport,
    /// Notifications produced.
    pub notifications: usize,
    /// Snapshots deleted by retention.
    pub pruned: u64,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

/// Result of a sync request.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The cycle ran to completion.
    Completed(SyncReport),
    /// Another cycle was in flight; nothing was done.
    Skipped,
}

/// Releases the single-flight flag when dropped, including on early
/// return or panic inside the cycle.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs the fetch → save → history → alerts pipeline.
#[derive(Debug)]
pub struct SyncService {
    registry: AggregationRegistry,
    history: HistoryService,
    alerts: AlertService,
    event_bus: EventBus,
    retention_days: u64,
    in_flight: AtomicBool,
    last_report: RwLock<Option<SyncReport>>,
}

impl SyncService {
    /// Creates a new `SyncService`.
    #[must_use]
    pub fn new(
        registry: AggregationRegistry,
        history: HistoryService,
        alerts: AlertService,
        event_bus: EventBus,
        retention_days: u64,
    ) -> Self {
        Self {
            registry,
            history,
            alerts,
            event_bus,
            retention_days,
            in_flight: AtomicBool::new(false),
            last_report: RwLock::new(None),
        }
    }

    /// Returns `true` while a cycle is running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Report of the most recent completed cycle.
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Runs one sync cycle unless another is already in flight.
    ///
    /// Step failures are logged and do not abort the later steps.
    pub async fn run_sync_cycle(&self) -> SyncOutcome {
        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            tracing::info!("sync cycle already in flight, skipping");
            return SyncOutcome::Skipped;
        };

        let cycle_id = Uuid::new_v4();
        let started = Instant::now();
        let started_at = Utc::now();
        tracing::info!(%cycle_id, "sync cycle started");

        let aggregation = self.registry.aggregate().await;
        for failure in &aggregation.failures {
            let _ = self.event_bus.publish(GatewayEvent::SourceFailed {
                source_name: failure.source_name.clone(),
                reason: failure.reason.clone(),
                timestamp: Utc::now(),
            });
        }
        let opportunities = aggregation.opportunities;

        let snapshots = match self.history.save_snapshots(&opportunities, started_at).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "snapshot save failed");
                BulkInsertReport {
                    inserted: 0,
                    failed: opportunities.len(),
                }
            }
        };

        let history = self.history.append_history(&opportunities, started_at).await;

        let live_rates = LiveRates::from_opportunities(&opportunities);
        let notifications = match self.alerts.evaluate(&live_rates, Utc::now()).await {
            Ok(produced) => produced.len(),
            Err(e) => {
                tracing::error!(%cycle_id, error = %e, "alert evaluation failed");
                0
            }
        };

        let pruned = match self.history.prune_snapshots(self.retention_days, Utc::now()).await {
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(%cycle_id, error = %e, "snapshot pruning failed");
                0
            }
        };

        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let report = SyncReport {
            cycle_id,
            started_at,
            fetched: opportunities.len(),
            failed_sources: aggregation
                .failures
                .into_iter()
                .map(|f| f.source_name)
                .collect(),
            snapshots,
            history,
            notifications,
            pruned,
            duration_ms,
        };

        tracing::info!(
            %cycle_id,
            fetched = report.fetched,
            snapshots = report.snapshots.inserted,
            history_inserted = report.history.inserted,
            history_updated = report.history.updated,
            notifications,
            duration_ms,
            "sync cycle completed"
        );
        let _ = self.event_bus.publish(GatewayEvent::SyncCompleted {
            cycle_id,
            fetched: report.fetched,
            snapshots_saved: report.snapshots.inserted,
            history_inserted: report.history.inserted,
            history_updated: report.history.updated,
            notifications,
            duration_ms,
            timestamp: Utc::now(),
        });

        *self.last_report.write().await = Some(report.clone());
        SyncOutcome::Completed(report)
    }

    /// Fetches live rates and evaluates alerts without persisting a cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if active alerts cannot be read.
    pub async fn evaluate_alerts_now(&self) -> Result<Vec<Notification>, GatewayError> {
        let opportunities = self.registry.fetch_all().await;
        let live_rates = LiveRates::from_opportunities(&opportunities);
        self.alerts.evaluate(&live_rates, Utc::now()).await
    }
}

#[derive(Debug)]
struct RunningTask {
    interval: Duration,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Scheduler state reported by the admin API.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SchedulerStatus {
    /// Whether the timer is active.
    pub running: bool,
    /// Tick interval in seconds while running.
    pub interval_secs: Option<u64>,
    /// Whether a cycle is executing right now.
    pub cycle_in_flight: bool,
    /// Most recent completed cycle.
    pub last_cycle: Option<SyncReport>,
}

/// Recurring timer driving [`SyncService::run_sync_cycle`].
///
/// The first cycle runs immediately on start. Each tick spawns its cycle,
/// so a slow cycle never delays the timer; overlapping ticks are absorbed
/// by the single-flight guard.
#[derive(Debug)]
pub struct SyncScheduler {
    service: Arc<SyncService>,
    running: Mutex<Option<RunningTask>>,
}

impl SyncScheduler {
    /// Creates a stopped scheduler.
    #[must_use]
    pub fn new(service: Arc<SyncService>) -> Self {
        Self {
            service,
            running: Mutex::new(None),
        }
    }

    /// Returns the driven service.
    #[must_use]
    pub fn service(&self) -> &Arc<SyncService> {
        &self.service
    }

    /// Starts the timer. Returns `false` (and does nothing) if it is
    /// already running.
    pub async fn start(&self, interval: Duration) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|task| !task.handle.is_finished()) {
            tracing::warn!("sync scheduler already running, ignoring start");
            return false;
        }

        let (stop_tx, mut stop_rx) = watch::channel(false);
        let service = Arc::clone(&self.service);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let service = Arc::clone(&service);
                        tokio::spawn(async move {
                            let _ = service.run_sync_cycle().await;
                        });
                    }
                }
            }
            tracing::info!("sync scheduler stopped");
        });

        tracing::info!(interval_secs = interval.as_secs(), "sync scheduler started");
        *running = Some(RunningTask {
            interval,
            stop_tx,
            handle,
        });
        true
    }

    /// Stops the timer. An in-flight cycle completes. Returns `false` if
    /// the scheduler was not running.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.running.lock().await.take() else {
            return false;
        };
        let _ = task.stop_tx.send(true);
        !task.handle.is_finished()
    }

    /// Returns `true` while the timer is active.
    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Current scheduler state.
    pub async fn status(&self) -> SchedulerStatus {
        let interval_secs = self
            .running
            .lock()
            .await
            .as_ref()
            .filter(|task| !task.handle.is_finished())
            .map(|task| task.interval.as_secs());
        SchedulerStatus {
            running: interval_secs.is_some(),
            interval_secs,
            cycle_in_flight: self.service.is_in_flight(),
            last_cycle: self.service.last_report().await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{AlertType, Opportunity};
    use crate::domain::opportunity::fixtures::opportunity;
    use crate::persistence::faulty::FaultyStore;
    use crate::persistence::{MemoryStore, YieldStore};
    use crate::sources::YieldSource;

    /// Source that counts calls and optionally sleeps before answering.
    #[derive(Debug)]
    struct CountingSource {
        calls: AtomicUsize,
        delay: Duration,
        apr: f64,
    }

    impl CountingSource {
        fn new(delay: Duration, apr: f64) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
                apr,
            }
        }
    }

    #[async_trait]
    impl YieldSource for CountingSource {
        fn name(&self) -> &str {
            "counting"
        }

        async fn fetch_opportunities(&self) -> Result<Vec<Opportunity>, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(vec![opportunity("OKX", "BTC", self.apr, Utc::now())])
        }
    }

    fn build(source: Arc<CountingSource>, store: Arc<dyn YieldStore>) -> Arc<SyncService> {
        let bus = EventBus::new(64);
        let registry = AggregationRegistry::new(
            vec![source as Arc<dyn crate::sources::YieldSource>],
            Duration::from_secs(30),
        );
        Arc::new(SyncService::new(
            registry,
            HistoryService::new(Arc::clone(&store), chrono::Duration::hours(1)),
            AlertService::new(store, bus.clone(), chrono::Duration::hours(1)),
            bus,
            30,
        ))
    }

    #[tokio::test]
    async fn cycle_runs_pipeline_in_order() {
        let store: Arc<dyn YieldStore> = Arc::new(MemoryStore::new());
        let Ok(_) = store
            .insert_alert(&crate::domain::Alert::new("u1", "BTC", "OKX", AlertType::Above, 5.0))
            .await
        else {
            panic!("alert insert failed");
        };
        let service = build(Arc::new(CountingSource::new(Duration::ZERO, 6.0)), Arc::clone(&store));

        let SyncOutcome::Completed(report) = service.run_sync_cycle().await else {
            panic!("cycle should run");
        };
        assert_eq!(report.fetched, 1);
        assert_eq!(report.snapshots.inserted, 1);
        assert_eq!(report.history.inserted, 1);
        assert_eq!(report.notifications, 1);
        assert!(!service.is_in_flight());
        assert_eq!(service.last_report().await, Some(report));
    }

    #[tokio::test]
    async fn unreachable_snapshot_store_does_not_stop_the_cycle() {
        let store = Arc::new(FaultyStore {
            snapshots_unavailable: true,
            ..FaultyStore::default()
        });
        let _ = store
            .insert_alert(&crate::domain::Alert::new("u1", "BTC", "OKX", AlertType::Above, 5.0))
            .await;
        let service = build(
            Arc::new(CountingSource::new(Duration::ZERO, 6.0)),
            Arc::clone(&store) as Arc<dyn YieldStore>,
        );

        let SyncOutcome::Completed(report) = service.run_sync_cycle().await else {
            panic!("cycle should run");
        };
        assert_eq!(report.snapshots.inserted, 0);
        assert_eq!(report.snapshots.failed, 1);
        assert_eq!(report.history.inserted, 1);
        assert_eq!(report.notifications, 1);

        let Ok(stored) = store.notifications_for_user("u1", false).await else {
            panic!("read failed");
        };
        assert_eq!(stored.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_cycle_is_skipped() {
        let source = Arc::new(CountingSource::new(Duration::from_secs(10), 1.0));
        let service = build(Arc::clone(&source), Arc::new(MemoryStore::new()));

        let (first, second) = tokio::join!(service.run_sync_cycle(), service.run_sync_cycle());
        assert!(matches!(first, SyncOutcome::Completed(_)));
        assert_eq!(second, SyncOutcome::Skipped);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        // The guard is released afterwards.
        assert!(matches!(service.run_sync_cycle().await, SyncOutcome::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduler_runs_immediately_then_every_interval() {
        let source = Arc::new(CountingSource::new(Duration::ZERO, 1.0));
        let scheduler = SyncScheduler::new(build(Arc::clone(&source), Arc::new(MemoryStore::new())));

        assert!(scheduler.start(Duration::from_secs(60)).await);
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        assert!(scheduler.stop().await);
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(!scheduler.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let source = Arc::new(CountingSource::new(Duration::ZERO, 1.0));
        let scheduler = SyncScheduler::new(build(source, Arc::new(MemoryStore::new())));

        assert!(!scheduler.stop().await);
        assert!(scheduler.start(Duration::from_secs(60)).await);
        assert!(!scheduler.start(Duration::from_secs(5)).await);
        assert!(scheduler.is_running().await);

        let status = scheduler.status().await;
        assert_eq!(status.interval_secs, Some(60));

        assert!(scheduler.stop().await);
        assert!(!scheduler.stop().await);
    }
}
