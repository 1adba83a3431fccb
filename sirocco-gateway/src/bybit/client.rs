//! Bybit WebSocket client.

use crate::bybit::BybitChannel;
use crate::heartbeat::{HeartBeat, SchedulerError};
use crate::rest::RequestSigner;
use crate::ws::{
    ConnectionState, HeartbeatPayload, SubscriptionRegistry, TextPayload, WebSocketClient,
    WebSocketConfig, WsHandler, WsSession,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use sirocco_core::config::Credentials;
use sirocco_core::{ExchangeError, Settings};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Private order update topic.
pub const TOPIC_ORDER: &str = "order";
/// Private position update topic.
pub const TOPIC_POSITION: &str = "position";
/// Private execution (fill) topic.
pub const TOPIC_EXECUTION: &str = "execution";
/// Private wallet balance topic.
pub const TOPIC_WALLET: &str = "wallet";

/// Client pings every 20 ticks; Bybit drops connections idle >30s.
const PING_INTERVAL_TICKS: u64 = 20;

struct BybitHandler {
    registry: Arc<SubscriptionRegistry>,
    credentials: Option<Credentials>,
    topics: RwLock<Vec<String>>,
    req_counter: AtomicU64,
}

impl BybitHandler {
    fn next_req_id(&self) -> String {
        format!(
            "req_{}_{}",
            sirocco_core::time::now_ms(),
            self.req_counter.fetch_add(1, Ordering::Relaxed)
        )
    }

    fn auth_frame(&self) -> Option<Value> {
        let credentials = self.credentials.as_ref()?;
        let expires = sirocco_core::time::now_ms() + 1000;
        let signer = RequestSigner::hmac_sha256(&credentials.api_secret);
        match signer.sign(&format!("GET/realtime{expires}")) {
            Ok(signature) => Some(json!({
                "req_id": self.next_req_id(),
                "op": "auth",
                "args": [credentials.api_key, expires, signature],
            })),
            Err(e) => {
                error!(error = %e, "failed to sign bybit auth payload");
                None
            }
        }
    }

    fn subscribe_frame(&self, topics: &[String]) -> Value {
        json!({
            "req_id": self.next_req_id(),
            "op": "subscribe",
            "args": topics,
        })
    }
}

#[async_trait]
impl WsHandler for BybitHandler {
    async fn on_connect(&self, session: &WsSession) {
        if self.credentials.is_some() {
            if let Some(frame) = self.auth_frame() {
                session.send_json(&frame).await;
            }
        }

        let topics = self.topics.read().clone();
        if !topics.is_empty() {
            info!(count = topics.len(), "resubscribing bybit topics");
            session.send_json(&self.subscribe_frame(&topics)).await;
        }
    }

    async fn process(&self, payload: TextPayload) {
        let value = match payload {
            TextPayload::Json(value) => value,
            TextPayload::Raw(text) => {
                warn!(text, "unexpected non-JSON frame");
                return;
            }
        };

        if let Some(topic) = value.get("topic").and_then(Value::as_str) {
            let topic = topic.to_string();
            self.registry.dispatch(&topic, value).await;
            return;
        }

        match value.get("op").and_then(Value::as_str) {
            Some("auth") => {
                if value.get("success").and_then(Value::as_bool) == Some(true) {
                    info!("bybit authentication succeeded");
                } else {
                    let e = ExchangeError::AuthenticationFailed {
                        reason: value
                            .get("ret_msg")
                            .and_then(Value::as_str)
                            .unwrap_or("unknown")
                            .to_string(),
                    };
                    error!(error = %e, "bybit authentication failed");
                }
            }
            Some("subscribe") => {
                if value.get("success").and_then(Value::as_bool) == Some(false) {
                    warn!(
                        ret_msg = value.get("ret_msg").and_then(serde_json::Value::as_str),
                        "bybit subscription rejected"
                    );
                } else {
                    debug!("bybit subscription acknowledged");
                }
            }
            Some("ping" | "pong") => {
                debug!("bybit pong received");
            }
            _ => {
                debug!(message = %value, "unhandled bybit message");
            }
        }
    }
}

/// Bybit v5 stream client.
///
/// Public streams need no credentials; the private stream
/// authenticates on connect and carries order, position, execution
/// and wallet updates.
pub struct BybitWebSocket {
    client: Arc<WebSocketClient>,
    handler: Arc<BybitHandler>,
    registry: Arc<SubscriptionRegistry>,
}

impl BybitWebSocket {
    /// Creates a public market data client for a channel.
    #[must_use]
    pub fn public(channel: BybitChannel, heartbeat: Arc<HeartBeat>) -> Self {
        Self::build(channel, None, None, heartbeat)
    }

    /// Creates a private account stream client.
    #[must_use]
    pub fn private(credentials: Credentials, heartbeat: Arc<HeartBeat>) -> Self {
        Self::build(BybitChannel::Private, Some(credentials), None, heartbeat)
    }

    /// Creates a private client with credentials from settings.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeError::MissingCredentials` if no account is
    /// configured for bybit.
    pub fn private_from_settings(
        settings: &Settings,
        heartbeat: Arc<HeartBeat>,
    ) -> Result<Self, ExchangeError> {
        let credentials =
            settings
                .account("bybit")
                .map_err(|_| ExchangeError::MissingCredentials {
                    exchange: "bybit".to_string(),
                })?;
        Ok(Self::private(credentials.clone(), heartbeat))
    }

    /// Creates a client with an explicit proxy.
    #[must_use]
    pub fn with_proxy(
        channel: BybitChannel,
        credentials: Option<Credentials>,
        proxy: Option<String>,
        heartbeat: Arc<HeartBeat>,
    ) -> Self {
        Self::build(channel, credentials, proxy, heartbeat)
    }

    fn build(
        channel: BybitChannel,
        credentials: Option<Credentials>,
        proxy: Option<String>,
        heartbeat: Arc<HeartBeat>,
    ) -> Self {
        let config = WebSocketConfig::builder()
            .url(channel.url())
            .exchange("bybit")
            .proxy(proxy)
            .heartbeat_interval_ticks(PING_INTERVAL_TICKS)
            .build();

        let registry = Arc::new(SubscriptionRegistry::new());
        let handler = Arc::new(BybitHandler {
            registry: Arc::clone(&registry),
            credentials,
            topics: RwLock::new(Vec::new()),
            req_counter: AtomicU64::new(0),
        });

        let client = Arc::new(
            WebSocketClient::new(
                config,
                Arc::clone(&handler) as Arc<dyn WsHandler>,
                heartbeat,
            )
            .with_heartbeat_payload(HeartbeatPayload::Json(json!({"op": "ping"}))),
        );

        Self {
            client,
            handler,
            registry,
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

    /// Subscribes to topics and registers them for resubscription
    /// after a reconnect. Returns true if the frame was sent (always
    /// true while disconnected; the topics go out on connect).
    pub async fn subscribe(&self, topics: &[&str]) -> bool {
        let new_topics: Vec<String> = {
            let mut stored = self.handler.topics.write();
            let mut added = Vec::new();
            for topic in topics {
                if !stored.iter().any(|t| t == topic) {
                    stored.push((*topic).to_string());
                    added.push((*topic).to_string());
                }
            }
            added
        };

        if new_topics.is_empty() {
            return true;
        }
        if !self.is_connected() {
            // sent by on_connect
            return true;
        }
        self.client
            .send_json(&self.handler.subscribe_frame(&new_topics))
            .await
    }

    /// Unsubscribes from topics. Returns true if the frame was sent.
    pub async fn unsubscribe(&self, topics: &[&str]) -> bool {
        {
            let mut stored = self.handler.topics.write();
            stored.retain(|t| !topics.contains(&t.as_str()));
        }

        if !self.is_connected() {
            return true;
        }
        let frame = json!({
            "req_id": self.handler.next_req_id(),
            "op": "unsubscribe",
            "args": topics,
        });
        self.client.send_json(&frame).await
    }

    /// Registers a callback for a topic.
    pub fn on<F, Fut>(&self, topic: impl Into<String>, callback: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = sirocco_core::Result<()>> + Send + 'static,
    {
        self.registry.insert(topic, callback);
    }

    /// Removes a topic callback.
    pub fn off(&self, topic: &str) -> bool {
        self.registry.remove(topic)
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

impl std::fmt::Debug for BybitWebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitWebSocket")
            .field("state", &self.state())
            .field("subscriptions", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn handler(credentials: Option<Credentials>) -> (Arc<BybitHandler>, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handler = Arc::new(BybitHandler {
            registry: Arc::clone(&registry),
            credentials,
            topics: RwLock::new(Vec::new()),
            req_counter: AtomicU64::new(0),
        });
        (handler, registry)
    }

    #[tokio::test]
    async fn topic_messages_route_by_topic() {
        let (handler, registry) = handler(None);
        let hits = Arc::new(AtomicUsize::new(0));

        let hits2 = Arc::clone(&hits);
        registry.insert("orderbook.50.BTCUSDT", move |msg| {
            let hits = Arc::clone(&hits2);
            async move {
                assert_eq!(msg["type"], "snapshot");
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        handler
            .process(TextPayload::Json(json!({
                "topic": "orderbook.50.BTCUSDT",
                "type": "snapshot",
                "data": {"s": "BTCUSDT", "b": [], "a": []}
            })))
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn control_frames_are_consumed() {
        let (handler, registry) = handler(None);
        registry.insert("order", |_| async {
            panic!("control frames must not dispatch");
        });

        handler
            .process(TextPayload::Json(
                json!({"op": "pong", "success": true, "ret_msg": "pong"}),
            ))
            .await;
        handler
            .process(TextPayload::Json(
                json!({"op": "subscribe", "success": true}),
            ))
            .await;
        handler
            .process(TextPayload::Json(
                json!({"op": "auth", "success": false, "ret_msg": "invalid signature"}),
            ))
            .await;
    }

    #[test]
    fn auth_frame_shape() {
        let (handler, _) = handler(Some(Credentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
        }));

        let frame = handler.auth_frame().unwrap();
        assert_eq!(frame["op"], "auth");
        assert_eq!(frame["args"][0], "key");
        assert!(frame["args"][1].is_i64());
        // HMAC-SHA256 hex signature
        let signature = frame["args"][2].as_str().unwrap();
        assert_eq!(signature.len(), 64);
        assert!(frame["req_id"].as_str().unwrap().starts_with("req_"));
    }

    #[test]
    fn auth_frame_requires_credentials() {
        let (handler, _) = handler(None);
        assert!(handler.auth_frame().is_none());
    }

    #[test]
    fn subscribe_frame_shape() {
        let (handler, _) = handler(None);
        let frame = handler.subscribe_frame(&["publicTrade.BTCUSDT".to_string()]);
        assert_eq!(frame["op"], "subscribe");
        assert_eq!(frame["args"][0], "publicTrade.BTCUSDT");
    }

    #[test]
    fn missing_credentials_error() {
        let settings = Settings::default();
        let heartbeat = Arc::new(HeartBeat::new());
        let result = BybitWebSocket::private_from_settings(&settings, heartbeat);
        assert!(matches!(
            result.unwrap_err(),
            ExchangeError::MissingCredentials { .. }
        ));
    }
}
