//! WebSocket message types: envelope and client commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Server → client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Echo of the request ID for responses; server-generated for events.
    pub id: String,
    /// Message type discriminator.
    #[serde(rename = "type")]
    pub msg_type: WsMessageType,
    /// ISO-8601 timestamp.
    pub timestamp: DateTime<Utc>,
    /// Variant-specific payload.
    pub payload: serde_json::Value,
}

impl WsMessage {
    /// Builds a message stamped with the current time.
    #[must_use]
    pub fn new(id: String, msg_type: WsMessageType, payload: serde_json::Value) -> Self {
        Self {
            id,
            msg_type,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Builds an error message with a numeric code.
    #[must_use]
    pub fn error(id: String, code: u16, message: &str) -> Self {
        Self::new(
            id,
            WsMessageType::Error,
            serde_json::json!({ "code": code, "message": message }),
        )
    }
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Server → Client response to a command.
    Response,
    /// Server → Client broadcast event.
    Event,
    /// Server → Client error.
    Error,
}

/// Client → server request: an optional correlation ID plus a command.
#[derive(Debug, Clone, Deserialize)]
pub struct WsRequest {
    /// Correlation ID echoed in the response.
    #[serde(default)]
    pub id: String,
    /// The command itself.
    #[serde(flatten)]
    pub command: WsCommand,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Start streaming events for the connection's user.
    Subscribe {
        /// User IDs, as a list or a single string. Only the caller's own ID
        /// is accepted; omitted means the caller.
        #[serde(default, deserialize_with = "one_or_many")]
        user_ids: Vec<String>,
    },
    /// Stop streaming events.
    Unsubscribe {
        /// User IDs, as a list or a single string; omitted means the caller.
        #[serde(default, deserialize_with = "one_or_many")]
        user_ids: Vec<String>,
    },
    /// Liveness probe.
    Ping,
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(id) => vec![id],
        OneOrMany::Many(ids) => ids,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn subscribe_command_parses_without_id() {
        let Ok(req) = serde_json::from_str::<WsRequest>(r#"{"command":"subscribe","user_ids":["u1"]}"#)
        else {
            panic!("valid subscribe");
        };
        assert!(req.id.is_empty());
        assert_eq!(
            req.command,
            WsCommand::Subscribe {
                user_ids: vec!["u1".to_string()]
            }
        );
    }

    #[test]
    fn single_user_string_is_accepted() {
        let Ok(req) = serde_json::from_str::<WsRequest>(r#"{"command":"unsubscribe","user_ids":"u1"}"#)
        else {
            panic!("valid unsubscribe");
        };
        assert_eq!(
            req.command,
            WsCommand::Unsubscribe {
                user_ids: vec!["u1".to_string()]
            }
        );
    }

    #[test]
    fn user_ids_may_be_omitted() {
        let Ok(req) = serde_json::from_str::<WsRequest>(r#"{"command":"subscribe"}"#) else {
            panic!("valid bare subscribe");
        };
        assert_eq!(req.command, WsCommand::Subscribe { user_ids: Vec::new() });
    }

    #[test]
    fn unknown_command_is_rejected() {
        assert!(serde_json::from_str::<WsRequest>(r#"{"command":"swap"}"#).is_err());
    }

    #[test]
    fn ping_with_id() {
        let Ok(req) = serde_json::from_str::<WsRequest>(r#"{"id":"7","command":"ping"}"#) else {
            panic!("valid ping");
        };
        assert_eq!(req.id, "7");
        assert_eq!(req.command, WsCommand::Ping);
    }
}
