//! WebSocket layer: connection handling, message routing, subscriptions.
//!
//! The WebSocket endpoint at `/ws` streams sync and notification events to
//! the user named by the `x-user-id` header. A connection starts muted and
//! begins streaming after a `subscribe` command for its own user.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;
