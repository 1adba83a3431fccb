//! Shared session handle for an open connection.

use crate::ws::state::{ConnectionState, InternalState};
use futures::stream::SplitSink;
use futures::SinkExt;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

pub(crate) type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Cloneable handle to a client's connection.
///
/// Handlers receive a `WsSession` in
/// [`on_connect`](crate::ws::WsHandler::on_connect) and can hold on to
/// a clone for later sends. Send methods report success as a bool and
/// never fail the caller.
#[derive(Clone)]
pub struct WsSession {
    url: String,
    state: Arc<RwLock<InternalState>>,
    sink: Arc<tokio::sync::Mutex<Option<WsSink>>>,
    stream_alive: Arc<AtomicBool>,
}

impl WsSession {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            state: Arc::new(RwLock::new(InternalState::default())),
            sink: Arc::new(tokio::sync::Mutex::new(None)),
            stream_alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.read().state
    }

    /// Returns true if the connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the reconnect attempts since the last good connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.state.read().reconnect_attempts
    }

    /// Returns how long the current connection has been up.
    #[must_use]
    pub fn connected_for(&self) -> Option<std::time::Duration> {
        self.state.read().last_connected.map(|t| t.elapsed())
    }

    /// Returns the time since the last received data frame.
    #[must_use]
    pub fn idle_for(&self) -> Option<std::time::Duration> {
        self.state.read().last_message.map(|t| t.elapsed())
    }

    /// Sends a text frame. Returns false if the connection is down or
    /// the send fails.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            warn!(url = %self.url, "send skipped: not connected");
            return false;
        };

        match sink.send(Message::Text(text)).await {
            Ok(()) => true,
            Err(e) => {
                error!(url = %self.url, error = %e, "send failed");
                // let the liveness check pick up the dead stream
                self.stream_alive.store(false, Ordering::Release);
                false
            }
        }
    }

    /// Serializes a value to JSON and sends it as a text frame.
    ///
    /// Returns false on serialization failure, when disconnected, or
    /// when the send fails.
    pub async fn send_json<T: Serialize>(&self, value: &T) -> bool {
        match serde_json::to_string(value) {
            Ok(text) => self.send_text(text).await,
            Err(e) => {
                error!(url = %self.url, error = %e, "failed to serialize outgoing message");
                false
            }
        }
    }

    pub(crate) fn internal(&self) -> &Arc<RwLock<InternalState>> {
        &self.state
    }

    pub(crate) fn sink(&self) -> &Arc<tokio::sync::Mutex<Option<WsSink>>> {
        &self.sink
    }

    pub(crate) fn stream_alive(&self) -> &Arc<AtomicBool> {
        &self.stream_alive
    }

    pub(crate) async fn install_sink(&self, sink: WsSink) {
        *self.sink.lock().await = Some(sink);
        self.stream_alive.store(true, Ordering::Release);
    }

    /// Drops the sink, closing the outgoing half.
    pub(crate) async fn clear_sink(&self) {
        let mut guard = self.sink.lock().await;
        if let Some(mut sink) = guard.take() {
            if let Err(e) = sink.close().await {
                debug!(url = %self.url, error = %e, "error closing sink");
            }
        }
        self.stream_alive.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for WsSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsSession")
            .field("url", &self.url)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_connection_returns_false() {
        let session = WsSession::new("wss://example.com/ws".to_string());
        assert!(!session.send_text("hello").await);
        assert!(!session.send_json(&serde_json::json!({"op": "ping"})).await);
        assert_eq!(session.state(), ConnectionState::Disconnected);
    }
}
