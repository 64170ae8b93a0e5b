//! WebSocket message types for operator dashboards.
//!
//! Defines the protocol between server and connected operators:
//! - Server → Client: connection greeting, live events, errors, pongs
//! - Client → Server: pings

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;
use crate::ports::{LiveEvent, LiveEventKind};

// ============================================
// Server → Client Messages
// ============================================

/// Control messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Channel registered.
    Connected(ConnectedMessage),

    /// Heartbeat response.
    Pong(PongMessage),

    /// Error occurred.
    Error(ErrorMessage),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub user_id: String,
    pub client_id: String,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PongMessage {
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorMessage {
    pub code: String,
    pub message: String,
    pub timestamp: String,
}

impl ServerMessage {
    pub fn pong() -> Self {
        ServerMessage::Pong(PongMessage {
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            code: code.into(),
            message: message.into(),
            timestamp: Timestamp::now().to_rfc3339(),
        })
    }
}

/// Live event as delivered on the wire.
#[derive(Debug, Clone, Serialize)]
pub struct EventFrame<'a> {
    #[serde(rename = "type")]
    pub kind: LiveEventKind,
    pub data: &'a serde_json::Value,
    pub timestamp: String,
}

impl<'a> From<&'a LiveEvent> for EventFrame<'a> {
    fn from(event: &'a LiveEvent) -> Self {
        Self {
            kind: event.kind,
            data: &event.data,
            timestamp: Timestamp::now().to_rfc3339(),
        }
    }
}

// ============================================
// Client → Server Messages
// ============================================

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Keep-alive request.
    Ping,
}
