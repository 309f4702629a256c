//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection,
//! dispatching incoming commands and forwarding filtered events.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use super::messages::{WsCommand, WsMessage, WsMessageType, WsRequest};
use super::subscription::SubscriptionManager;
use crate::domain::GatewayEvent;

/// Runs the read/write loop for a connection opened by `user_id`.
///
/// - Reads commands from the client and answers them.
/// - Forwards matching events from the [`broadcast::Receiver`] to the client.
pub async fn run_connection(
    socket: WebSocket,
    mut event_rx: broadcast::Receiver<GatewayEvent>,
    user_id: String,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();
    let mut subs = SubscriptionManager::new(user_id);

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = handle_text_message(&text, &mut subs);
                        if let Some(json) = reply
                            && ws_tx.send(Message::text(json)).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "ws read failed");
                        break;
                    }
                    _ => {}
                }
            }
            event = event_rx.recv() => {
                match event {
                    Ok(event) => {
                        if !subs.matches(&event) {
                            continue;
                        }
                        let Some(json) = event_message(&event) else {
                            continue;
                        };
                        if ws_tx.send(Message::text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!(lagged = n, "ws client lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    tracing::debug!("ws connection closed");
}

/// Wraps a gateway event in the message envelope.
fn event_message(event: &GatewayEvent) -> Option<String> {
    let payload = serde_json::to_value(event).ok()?;
    let msg = WsMessage::new(uuid::Uuid::new_v4().to_string(), WsMessageType::Event, payload);
    serde_json::to_string(&msg).ok()
}

/// Handles a text frame from the client, returning the JSON reply.
fn handle_text_message(text: &str, subs: &mut SubscriptionManager) -> Option<String> {
    let reply = match serde_json::from_str::<WsRequest>(text) {
        Ok(WsRequest { id, command }) => match command {
            WsCommand::Subscribe { user_ids } => match subs.subscribe(user_ids.iter().map(String::as_str)) {
                Ok(()) => WsMessage::new(
                    id,
                    WsMessageType::Response,
                    serde_json::json!({ "subscribed": subs.owner(), "active": true }),
                ),
                Err(foreign) => {
                    tracing::warn!(user_id = subs.owner(), requested = %foreign, "ws subscription refused");
                    WsMessage::error(id, 403, "connections can only follow their own user")
                }
            },
            WsCommand::Unsubscribe { user_ids } => {
                subs.unsubscribe(user_ids.iter().map(String::as_str));
                WsMessage::new(
                    id,
                    WsMessageType::Response,
                    serde_json::json!({ "unsubscribed": subs.owner(), "active": subs.is_active() }),
                )
            }
            WsCommand::Ping => WsMessage::new(id, WsMessageType::Response, serde_json::json!({ "pong": true })),
        },
        Err(e) => {
            tracing::debug!(error = %e, "ws command rejected");
            WsMessage::error(String::new(), 400, "malformed or unknown command")
        }
    };
    serde_json::to_string(&reply).ok()
}
