//! Per-connection subscription state.
//!
//! A connection belongs to the user who opened it and can only follow that
//! user's notifications. Broadcast events (sync, source failures) reach the
//! connection while the subscription is on; notification events reach it
//! only when addressed to the owner.

use crate::domain::GatewayEvent;

/// Subscription state of a single WebSocket connection.
#[derive(Debug)]
pub struct SubscriptionManager {
    owner: String,
    active: bool,
}

impl SubscriptionManager {
    /// Creates an inactive subscription for `owner`.
    #[must_use]
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            active: false,
        }
    }

    /// The user this connection belongs to.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Turns the subscription on.
    ///
    /// An empty list means the owner. Blank entries are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first ID naming someone other than the owner (including
    /// `"*"`); the state is left unchanged.
    pub fn subscribe<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) -> Result<(), String> {
        if let Some(foreign) = self.first_foreign(ids) {
            return Err(foreign);
        }
        self.active = true;
        Ok(())
    }

    /// Turns the subscription off when `ids` is empty or names the owner.
    pub fn unsubscribe<'a>(&mut self, ids: impl IntoIterator<Item = &'a str>) {
        let mut ids = ids.into_iter().map(str::trim).filter(|id| !id.is_empty()).peekable();
        if ids.peek().is_none() || ids.any(|id| id == self.owner) {
            self.active = false;
        }
    }

    /// Returns `true` while the connection is subscribed.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` if `event` should be forwarded to this client.
    #[must_use]
    pub fn matches(&self, event: &GatewayEvent) -> bool {
        self.active && event.user_id().is_none_or(|user| user == self.owner)
    }

    fn first_foreign<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Option<String> {
        ids.into_iter()
            .map(str::trim)
            .find(|id| !id.is_empty() && *id != self.owner)
            .map(str::to_string)
    }
}
