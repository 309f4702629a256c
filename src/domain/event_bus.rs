//! In-process fan-out of gateway events.
//!
//! The sync service announces each finished cycle and each failing source,
//! and the alert service announces every notification it stores. WebSocket
//! connections each hold their own receiver and decide per event whether
//! their user should see it.

use tokio::sync::broadcast;

use super::GatewayEvent;

/// Fan-out channel shared by the services and the WebSocket layer.
///
/// Events are not persisted here: a connection that falls more than
/// `capacity` events behind skips the oldest ones and keeps going. The
/// notification itself is already in the store, so a skipped event only
/// costs the client a live push.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    /// Creates a bus buffering up to `capacity` undelivered events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes `event` and returns how many connections will see it.
    ///
    /// With nobody listening the event is dropped and `0` is returned;
    /// publishers never fail because of an idle bus.
    pub fn publish(&self, event: GatewayEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Opens a receiver for events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }
}
