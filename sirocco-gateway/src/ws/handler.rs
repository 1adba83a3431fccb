//! Message handler trait and payload types.

use crate::ws::session::WsSession;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// A text frame, pre-parsed as JSON when possible.
///
/// Exchanges speak JSON, but the occasional non-JSON frame (plain
/// "pong" strings, error pages) must not kill the receive loop, so
/// frames that fail to parse are passed through raw.
#[derive(Debug, Clone)]
pub enum TextPayload {
    /// Frame parsed as JSON.
    Json(Value),
    /// Frame that is not valid JSON.
    Raw(String),
}

impl TextPayload {
    /// Parses a text frame, falling back to raw on parse failure.
    #[must_use]
    pub fn parse(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(text),
        }
    }

    /// Returns the JSON value, if the frame parsed.
    #[must_use]
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Returns the raw text, if the frame did not parse.
    #[must_use]
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Raw(text) => Some(text),
        }
    }
}

/// Application-level heartbeat payload sent on the heartbeat schedule.
#[derive(Clone)]
pub enum HeartbeatPayload {
    /// Fixed text frame.
    Text(String),
    /// Fixed JSON frame.
    Json(Value),
    /// Frame generated per send, for payloads carrying a timestamp.
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl HeartbeatPayload {
    /// Renders the payload into the text frame to send.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Generator(generate) => generate().to_string(),
        }
    }
}

impl fmt::Debug for HeartbeatPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// Message semantics injected into a
/// [`WebSocketClient`](crate::ws::WebSocketClient).
///
/// [`process`](Self::process) is the only required method; lifecycle
/// hooks default to no-ops and binary frames are discarded with a
/// warning unless overridden.
#[async_trait]
pub trait WsHandler: Send + Sync {
    /// Called after a connection is established, before any message is
    /// processed. Used for authentication and resubscription.
    async fn on_connect(&self, _session: &WsSession) {}

    /// Called after the connection is lost or closed.
    async fn on_disconnect(&self) {}

    /// Processes an incoming text frame.
    async fn process(&self, payload: TextPayload);

    /// Processes an incoming binary frame.
    async fn process_binary(&self, data: Vec<u8>) {
        warn!(len = data.len(), "discarding unexpected binary frame");
    }
}
