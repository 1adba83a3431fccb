//! Binance WebSocket client.

use crate::binance::streams::BinanceMarket;
use crate::heartbeat::{HeartBeat, SchedulerError};
use crate::ws::{
    ConnectionState, SubscriptionRegistry, TextPayload, WebSocketClient, WebSocketConfig,
    WsHandler,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Stream key for single-stream connections.
///
/// Raw endpoint messages carry no stream name, only an event type
/// field, so they all route to this key.
pub const DEFAULT_STREAM_KEY: &str = "default";

struct BinanceHandler {
    registry: Arc<SubscriptionRegistry>,
}

#[async_trait]
impl WsHandler for BinanceHandler {
    async fn process(&self, payload: TextPayload) {
        let value = match payload {
            TextPayload::Json(value) => value,
            TextPayload::Raw(text) => {
                warn!(text, "unexpected non-JSON frame");
                return;
            }
        };

        // combined endpoint envelope
        if let (Some(stream), Some(data)) = (
            value.get("stream").and_then(Value::as_str),
            value.get("data"),
        ) {
            let stream = stream.to_string();
            let data = data.clone();
            self.registry.dispatch(&stream, data).await;
            return;
        }

        if let Some(error) = value.get("error") {
            error!(error = %error, "binance error response");
            return;
        }

        // {"result": null, "id": n} acknowledges a subscribe frame
        if let Some(id) = value.get("id") {
            debug!(id = %id, result = ?value.get("result"), "operation acknowledged");
            return;
        }

        // raw endpoint messages carry the event type in "e"
        if value.get("e").is_some() {
            self.registry.dispatch(DEFAULT_STREAM_KEY, value).await;
            return;
        }

        debug!(message = %value, "unhandled binance message");
    }
}

/// Binance market stream client.
///
/// # Example
///
/// ```rust,ignore
/// let ws = BinanceWebSocket::new(
///     BinanceMarket::Spot,
///     &[agg_trade("BTCUSDT").as_str()],
///     heartbeat,
/// );
/// ws.on(agg_trade("BTCUSDT"), |msg| async move {
///     println!("trade: {msg}");
///     Ok(())
/// });
/// ws.start()?;
/// ```
pub struct BinanceWebSocket {
    client: Arc<WebSocketClient>,
    registry: Arc<SubscriptionRegistry>,
    req_id: AtomicU64,
}

impl BinanceWebSocket {
    /// Creates a client for the given market and initial streams.
    #[must_use]
    pub fn new(market: BinanceMarket, streams: &[&str], heartbeat: Arc<HeartBeat>) -> Self {
        let config = WebSocketConfig::builder()
            .url(market.build_url(streams))
            .exchange("binance")
            .build();
        Self::with_config(config, heartbeat)
    }

    /// Creates a client from an explicit configuration, for proxies or
    /// tuned reconnect behavior.
    #[must_use]
    pub fn with_config(mut config: WebSocketConfig, heartbeat: Arc<HeartBeat>) -> Self {
        // the server pings the client; nothing to send on a schedule
        config.heartbeat_interval_ticks = 0;

        let registry = Arc::new(SubscriptionRegistry::new());
        let handler = Arc::new(BinanceHandler {
            registry: Arc::clone(&registry),
        });
        let client = Arc::new(WebSocketClient::new(config, handler, heartbeat));

        Self {
            client,
            registry,
            req_id: AtomicU64::new(1),
        }
    }

    /// Registers the scheduler tasks and connects in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if a task interval is invalid.
    pub fn start(&self) -> Result<(), SchedulerError> {
        self.client.start()
    }

    /// Opens the connection. Returns true on success.
    pub async fn connect(&self) -> bool {
        self.client.connect().await
    }

    /// Closes the connection permanently.
    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.client.state()
    }

    /// Returns true if connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Registers a callback for a stream.
    ///
    /// For single-stream connections use
    /// [`DEFAULT_STREAM_KEY`]; combined-stream messages route by their
    /// stream name.
    pub fn on<F, Fut>(&self, stream: impl Into<String>, callback: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = sirocco_core::Result<()>> + Send + 'static,
    {
        self.registry.insert(stream, callback);
    }

    /// Removes a stream callback.
    pub fn off(&self, stream: &str) -> bool {
        self.registry.remove(stream)
    }

    /// Sends a SUBSCRIBE frame for the given streams.
    pub async fn subscribe(&self, streams: &[&str]) -> bool {
        self.send_op("SUBSCRIBE", streams).await
    }

    /// Sends an UNSUBSCRIBE frame for the given streams.
    pub async fn unsubscribe(&self, streams: &[&str]) -> bool {
        self.send_op("UNSUBSCRIBE", streams).await
    }

    async fn send_op(&self, method: &str, streams: &[&str]) -> bool {
        let frame = json!({
            "method": method,
            "params": streams,
            "id": self.req_id.fetch_add(1, Ordering::Relaxed),
        });
        self.client.send_json(&frame).await
    }

    /// Returns the subscription registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// Returns the underlying WebSocket client.
    #[must_use]
    pub fn client(&self) -> &Arc<WebSocketClient> {
        &self.client
    }
}

impl std::fmt::Debug for BinanceWebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceWebSocket")
            .field("state", &self.state())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}
