//! Alert service: user alert management and threshold evaluation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::domain::{Alert, AlertId, AlertType, EventBus, GatewayEvent, LiveRates, Notification};
use crate::error::GatewayError;
use crate::persistence::YieldStore;

/// Evaluates active alerts against live rates and manages alert records.
///
/// A triggering alert produces exactly one notification per cooldown
/// period, even when evaluations overlap: the store claims the trigger and
/// writes the notification in one atomic step. A failed write is logged
/// and the batch moves on.
#[derive(Debug, Clone)]
pub struct AlertService {
    store: Arc<dyn YieldStore>,
    event_bus: EventBus,
    cooldown: Duration,
}

impl AlertService {
    /// Creates a new `AlertService`.
    #[must_use]
    pub fn new(store: Arc<dyn YieldStore>, event_bus: EventBus, cooldown: Duration) -> Self {
        Self {
            store,
            event_bus,
            cooldown,
        }
    }

    /// Creates an alert for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for a blank asset or
    /// platform or a non-finite or negative threshold.
    pub async fn create_alert(
        &self,
        user_id: &str,
        asset: &str,
        platform: &str,
        alert_type: AlertType,
        threshold: f64,
    ) -> Result<Alert, GatewayError> {
        if asset.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("asset must not be empty".to_string()));
        }
        if platform.trim().is_empty() {
            return Err(GatewayError::InvalidRequest("platform must not be empty".to_string()));
        }
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(GatewayError::InvalidRequest(
                "threshold must be a non-negative number".to_string(),
            ));
        }

        let alert = Alert::new(user_id, asset, platform, alert_type, threshold);
        self.store.insert_alert(&alert).await?;
        tracing::info!(alert_id = %alert.id, user_id, asset = %alert.asset, "alert created");
        Ok(alert)
    }

    /// Lists a user's alerts, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn list_alerts(&self, user_id: &str) -> Result<Vec<Alert>, GatewayError> {
        self.store.alerts_for_user(user_id).await
    }

    /// Arms or disarms a user's alert.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlertNotFound`] if the alert is not the user's.
    pub async fn set_active(
        &self,
        id: AlertId,
        user_id: &str,
        is_active: bool,
    ) -> Result<Alert, GatewayError> {
        self.store.set_alert_active(id, user_id, is_active).await
    }

    /// Deletes a user's alert. Its notifications remain.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::AlertNotFound`] if the alert is not the user's.
    pub async fn delete_alert(&self, id: AlertId, user_id: &str) -> Result<(), GatewayError> {
        self.store.delete_alert(id, user_id).await?;
        tracing::info!(alert_id = %id, user_id, "alert deleted");
        Ok(())
    }

    /// Evaluates every active alert against `live_rates` at `now` and
    /// returns the notifications that were stored.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] only if the active alerts cannot be read.
    pub async fn evaluate(
        &self,
        live_rates: &LiveRates,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, GatewayError> {
        let alerts = self.store.active_alerts().await?;
        let mut produced = Vec::new();

        for alert in alerts {
            let Some(apr) = live_rates.get(&alert.platform, &alert.asset) else {
                continue;
            };
            if !alert.should_fire(apr, now, self.cooldown) {
                continue;
            }

            let notification = Notification::for_alert(&alert, apr, now);
            match self
                .store
                .claim_alert_trigger(alert.id, now, self.cooldown, &notification)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(alert_id = %alert.id, "alert already claimed by a concurrent evaluation");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(alert_id = %alert.id, error = %e, "alert trigger write failed");
                    continue;
                }
            }

            tracing::info!(
                alert_id = %alert.id,
                user_id = %alert.user_id,
                apr,
                threshold = alert.threshold,
                "alert triggered"
            );
            let _ = self.event_bus.publish(GatewayEvent::NotificationCreated {
                user_id: alert.user_id.clone(),
                notification: notification.clone(),
                timestamp: now,
            });
            produced.push(notification);
        }

        Ok(produced)
    }
}
