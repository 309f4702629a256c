//! Notification inbox operations for a single user.

use std::sync::Arc;

use crate::domain::{Notification, NotificationId};
use crate::error::GatewayError;
use crate::persistence::YieldStore;

/// Read-state management over stored notifications.
#[derive(Debug, Clone)]
pub struct NotificationService {
    store: Arc<dyn YieldStore>,
}

impl NotificationService {
    /// Creates a new `NotificationService`.
    #[must_use]
    pub fn new(store: Arc<dyn YieldStore>) -> Self {
        Self { store }
    }

    /// Lists a user's notifications, newest first.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn list(&self, user_id: &str, unread_only: bool) -> Result<Vec<Notification>, GatewayError> {
        self.store.notifications_for_user(user_id, unread_only).await
    }

    /// Sets the read flag of one notification.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotificationNotFound`] if it is not the user's.
    pub async fn set_read(
        &self,
        id: NotificationId,
        user_id: &str,
        read: bool,
    ) -> Result<Notification, GatewayError> {
        self.store.set_notification_read(id, user_id, read).await
    }

    /// Marks all of a user's notifications as read.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] on store failure.
    pub async fn mark_all_read(&self, user_id: &str) -> Result<u64, GatewayError> {
        let updated = self.store.mark_all_notifications_read(user_id).await?;
        tracing::debug!(user_id, updated, "notifications marked read");
        Ok(updated)
    }

    /// Deletes one notification.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NotificationNotFound`] if it is not the user's.
    pub async fn delete(&self, id: NotificationId, user_id: &str) -> Result<(), GatewayError> {
        self.store.delete_notification(id, user_id).await
    }
}
