//! WebSocket message types: envelope and client commands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::NotificationKind;

/// Server-to-client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsMessage {
    /// Echoes the client's request id for responses; server-generated for
    /// events.
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
}

/// Discriminator for WebSocket message types.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Server → Client response to a command.
    Response,
    /// Server → Client notification.
    Notification,
    /// Server → Client error.
    Error,
}

/// A client frame: an optional request id plus the command.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientFrame {
    /// Request id echoed in the response.
    #[serde(default)]
    pub id: String,
    /// The command itself.
    #[serde(flatten)]
    pub command: WsCommand,
}

/// Commands that a client can send over WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum WsCommand {
    /// Only deliver notifications of these kinds (in addition to kinds
    /// already subscribed).
    Subscribe {
        /// Kinds to receive.
        kinds: Vec<NotificationKind>,
    },
    /// Stop delivering notifications of these kinds.
    Unsubscribe {
        /// Kinds to drop.
        kinds: Vec<NotificationKind>,
    },
    /// Liveness check.
    Ping,
}
