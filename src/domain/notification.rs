//! User notifications produced by the alert evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{Alert, AlertId, AlertType, NotificationId};

/// Notification kind written by the alert evaluator.
pub const KIND_APR_ALERT: &str = "apr_alert";

/// A message addressed to one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    /// Notification identifier.
    pub id: NotificationId,
    /// Recipient.
    pub user_id: String,
    /// Short headline.
    pub title: String,
    /// Full message body.
    pub message: String,
    /// Kind discriminator (e.g. `"apr_alert"`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Read state, toggled by the recipient.
    pub read: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Alert that produced this notification, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_id: Option<AlertId>,
}

impl Notification {
    /// Builds the notification for `alert` firing on `apr` at `now`.
    #[must_use]
    pub fn for_alert(alert: &Alert, apr: f64, now: DateTime<Utc>) -> Self {
        let relation = match alert.alert_type {
            AlertType::Above => "above",
            AlertType::Below => "below",
        };
        Self {
            id: NotificationId::new(),
            user_id: alert.user_id.clone(),
            title: format!("{} APR alert on {}", alert.asset, alert.platform),
            message: format!(
                "{} on {} is now {apr:.2}% APR, {relation} your threshold of {:.2}%",
                alert.asset, alert.platform, alert.threshold
            ),
            kind: KIND_APR_ALERT.to_string(),
            read: false,
            created_at: now,
            alert_id: Some(alert.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_notification_carries_rate_and_threshold() {
        let alert = Alert::new("user-1", "BTC", "OKX", AlertType::Above, 5.0);
        let now = Utc::now();
        let n = Notification::for_alert(&alert, 5.5, now);

        assert_eq!(n.user_id, "user-1");
        assert_eq!(n.kind, KIND_APR_ALERT);
        assert!(!n.read);
        assert_eq!(n.alert_id, Some(alert.id));
        assert_eq!(n.created_at, now);
        assert!(n.message.contains("5.50%"));
        assert!(n.message.contains("above your threshold of 5.00%"));
    }
}
