//! Gate.io WebSocket client.

use crate::gate::GateMarket;
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
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
struct Subscription {
    channel: String,
    payload: Vec<String>,
    private: bool,
}

struct GateHandler {
    registry: Arc<SubscriptionRegistry>,
    credentials: Option<Credentials>,
    prefix: &'static str,
    authenticated: AtomicBool,
    subscriptions: RwLock<Vec<Subscription>>,
    session: RwLock<Option<WsSession>>,
    req_counter: AtomicU64,
}

impl GateHandler {
    fn next_id(&self) -> u64 {
        self.req_counter.fetch_add(1, Ordering::Relaxed)
    }

    fn sign(&self, channel: &str, event: &str, time: i64) -> Option<String> {
        let credentials = self.credentials.as_ref()?;
        let signer = RequestSigner::hmac_sha512(&credentials.api_secret);
        let message = format!("channel={channel}&event={event}&time={time}");
        match signer.sign(&message) {
            Ok(signature) => Some(signature),
            Err(e) => {
                error!(error = %e, "failed to sign gate payload");
                None
            }
        }
    }

    fn auth_object(&self, channel: &str, event: &str, time: i64) -> Option<Value> {
        let credentials = self.credentials.as_ref()?;
        let sign = self.sign(channel, event, time)?;
        Some(json!({
            "method": "api_key",
            "KEY": credentials.api_key,
            "SIGN": sign,
        }))
    }

    fn login_frame(&self) -> Option<Value> {
        let time = sirocco_core::time::now_secs();
        let channel = format!("{}.login", self.prefix);
        let auth = self.auth_object(&channel, "subscribe", time)?;
        Some(json!({
            "time": time,
            "id": self.next_id(),
            "channel": channel,
            "event": "subscribe",
            "auth": auth,
        }))
    }

    fn subscribe_frame(&self, subscription: &Subscription, event: &str) -> Value {
        let time = sirocco_core::time::now_secs();
        let mut frame = json!({
            "time": time,
            "id": self.next_id(),
            "channel": subscription.channel,
            "event": event,
            "payload": subscription.payload,
        });
        if subscription.private {
            if let Some(auth) = self.auth_object(&subscription.channel, event, time) {
                frame["auth"] = auth;
            }
        }
        frame
    }

    async fn send_subscriptions(&self, session: &WsSession, private: bool) {
        let pending: Vec<Subscription> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.private == private)
            .cloned()
            .collect();
        for subscription in pending {
            session
                .send_json(&self.subscribe_frame(&subscription, "subscribe"))
                .await;
        }
    }
}

#[async_trait]
impl WsHandler for GateHandler {
    async fn on_connect(&self, session: &WsSession) {
        self.authenticated.store(false, Ordering::Release);
        *self.session.write() = Some(session.clone());

        if self.credentials.is_some() {
            if let Some(frame) = self.login_frame() {
                session.send_json(&frame).await;
            }
        }

        // public channels need no auth; private ones wait for the
        // login acknowledgement
        self.send_subscriptions(session, false).await;
    }

    async fn on_disconnect(&self) {
        self.authenticated.store(false, Ordering::Release);
        *self.session.write() = None;
    }

    async fn process(&self, payload: TextPayload) {
        let value = match payload {
            TextPayload::Json(value) => value,
            TextPayload::Raw(text) => {
                warn!(text, "unexpected non-JSON frame");
                return;
            }
        };

        let Some(channel) = value.get("channel").and_then(Value::as_str) else {
            debug!(message = %value, "gate message without channel");
            return;
        };

        if channel == format!("{}.pong", self.prefix) {
            debug!("gate pong received");
            return;
        }

        if channel == format!("{}.login", self.prefix) {
            if value.get("error").map_or(true, Value::is_null) {
                info!("gate authentication succeeded");
                self.authenticated.store(true, Ordering::Release);
                let session = self.session.read().clone();
                if let Some(session) = session {
                    self.send_subscriptions(&session, true).await;
                }
            } else {
                let e = ExchangeError::AuthenticationFailed {
                    reason: value["error"].to_string(),
                };
                error!(error = %e, "gate authentication failed");
            }
            return;
        }

        match value.get("event").and_then(Value::as_str) {
            Some("update") => {
                let result = value.get("result").cloned().unwrap_or(Value::Null);
                let channel = channel.to_string();
                self.registry.dispatch(&channel, result).await;
            }
            Some(event @ ("subscribe" | "unsubscribe")) => {
                if value.get("error").map_or(true, Value::is_null) {
                    debug!(channel, event, "gate {event} acknowledged");
                } else {
                    warn!(channel, error = %value["error"], "gate {event} rejected");
                }
            }
            _ => {
                debug!(channel, message = %value, "unhandled gate message");
            }
        }
    }
}

/// Gate.io v4 stream client.
///
/// One client serves either the spot endpoint or one futures
/// settlement endpoint; channels are qualified with the market prefix
/// (`spot.trades`, `futures.order_book`).
pub struct GateWebSocket {
    client: Arc<WebSocketClient>,
    handler: Arc<GateHandler>,
    registry: Arc<SubscriptionRegistry>,
    market: GateMarket,
}

impl GateWebSocket {
    /// Creates a public market data client.
    #[must_use]
    pub fn public(market: GateMarket, heartbeat: Arc<HeartBeat>) -> Self {
        Self::build(market, None, None, heartbeat)
    }

    /// Creates a client that can subscribe to private channels.
    #[must_use]
    pub fn private(
        market: GateMarket,
        credentials: Credentials,
        heartbeat: Arc<HeartBeat>,
    ) -> Self {
        Self::build(market, Some(credentials), None, heartbeat)
    }

    /// Creates a private client with credentials from settings.
    ///
    /// # Errors
    ///
    /// Returns `ExchangeError::MissingCredentials` if no account is
    /// configured for gate.
    pub fn private_from_settings(
        market: GateMarket,
        settings: &Settings,
        heartbeat: Arc<HeartBeat>,
    ) -> Result<Self, ExchangeError> {
        let credentials =
            settings
                .account("gate")
                .map_err(|_| ExchangeError::MissingCredentials {
                    exchange: "gate".to_string(),
                })?;
        Ok(Self::private(market, credentials.clone(), heartbeat))
    }

    fn build(
        market: GateMarket,
        credentials: Option<Credentials>,
        proxy: Option<String>,
        heartbeat: Arc<HeartBeat>,
    ) -> Self {
        let config = WebSocketConfig::builder()
            .url(market.url())
            .exchange("gate")
            .proxy(proxy)
            .build();

        let registry = Arc::new(SubscriptionRegistry::new());
        let handler = Arc::new(GateHandler {
            registry: Arc::clone(&registry),
            credentials,
            prefix: market.prefix(),
            authenticated: AtomicBool::new(false),
            subscriptions: RwLock::new(Vec::new()),
            session: RwLock::new(None),
            req_counter: AtomicU64::new(1),
        });

        let prefix = market.prefix();
        let ping = HeartbeatPayload::Generator(Arc::new(move || {
            json!({
                "time": sirocco_core::time::now_secs(),
                "channel": format!("{prefix}.ping"),
            })
        }));

        let client = Arc::new(
            WebSocketClient::new(
                config,
                Arc::clone(&handler) as Arc<dyn WsHandler>,
                heartbeat,
            )
            .with_heartbeat_payload(ping),
        );

        Self {
            client,
            handler,
            registry,
            market,
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

    /// Returns true if the private login has been acknowledged.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.handler.authenticated.load(Ordering::Acquire)
    }

    /// Returns the market this client is bound to.
    #[must_use]
    pub fn market(&self) -> GateMarket {
        self.market
    }

    /// Subscribes to a public channel.
    ///
    /// `channel` is the fully qualified name (`spot.trades`); `payload`
    /// carries channel arguments such as currency pairs. The
    /// subscription is remembered and resent after a reconnect.
    pub async fn subscribe(&self, channel: impl Into<String>, payload: Vec<String>) -> bool {
        self.subscribe_inner(channel.into(), payload, false).await
    }

    /// Subscribes to a private channel.
    ///
    /// Returns false if the client has no credentials. If the login is
    /// still pending the subscription is queued and sent on the login
    /// acknowledgement.
    pub async fn subscribe_private(
        &self,
        channel: impl Into<String>,
        payload: Vec<String>,
    ) -> bool {
        if self.handler.credentials.is_none() {
            warn!("private subscription requires credentials");
            return false;
        }
        self.subscribe_inner(channel.into(), payload, true).await
    }

    async fn subscribe_inner(&self, channel: String, payload: Vec<String>, private: bool) -> bool {
        let subscription = Subscription {
            channel,
            payload,
            private,
        };
        self.handler
            .subscriptions
            .write()
            .push(subscription.clone());

        if !self.is_connected() || (private && !self.is_authenticated()) {
            // sent on connect or on login acknowledgement
            return true;
        }
        self.client
            .send_json(&self.handler.subscribe_frame(&subscription, "subscribe"))
            .await
    }

    /// Unsubscribes from a channel.
    pub async fn unsubscribe(&self, channel: &str) -> bool {
        let removed: Vec<Subscription> = {
            let mut stored = self.handler.subscriptions.write();
            let (removed, kept): (Vec<Subscription>, Vec<Subscription>) =
                stored.drain(..).partition(|s| s.channel == channel);
            *stored = kept;
            removed
        };

        if !self.is_connected() {
            return true;
        }
        let mut ok = true;
        for subscription in removed {
            ok &= self
                .client
                .send_json(&self.handler.subscribe_frame(&subscription, "unsubscribe"))
                .await;
        }
        ok
    }

    /// Registers a callback for a channel's update messages.
    ///
    /// The callback receives the `result` field of update frames.
    pub fn on<F, Fut>(&self, channel: impl Into<String>, callback: F)
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = sirocco_core::Result<()>> + Send + 'static,
    {
        self.registry.insert(channel, callback);
    }

    /// Removes a channel callback.
    pub fn off(&self, channel: &str) -> bool {
        self.registry.remove(channel)
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

impl std::fmt::Debug for GateWebSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateWebSocket")
            .field("market", &self.market)
            .field("state", &self.state())
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn handler(credentials: Option<Credentials>) -> (Arc<GateHandler>, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let handler = Arc::new(GateHandler {
            registry: Arc::clone(&registry),
            credentials,
            prefix: "spot",
            authenticated: AtomicBool::new(false),
            subscriptions: RwLock::new(Vec::new()),
            session: RwLock::new(None),
            req_counter: AtomicU64::new(1),
        });
        (handler, registry)
    }

    fn credentials() -> Credentials {
        Credentials {
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            passphrase: None,
        }
    }

    #[tokio::test]
    async fn update_frames_dispatch_result() {
        let (handler, registry) = handler(None);
        let hits = Arc::new(AtomicUsize::new(0));

        let hits2 = Arc::clone(&hits);
        registry.insert("spot.trades", move |result| {
            let hits = Arc::clone(&hits2);
            async move {
                // callback gets the result field, not the envelope
                assert_eq!(result["currency_pair"], "BTC_USDT");
                hits.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        handler
            .process(TextPayload::Json(json!({
                "time": 1611541000,
                "channel": "spot.trades",
                "event": "update",
                "result": {"currency_pair": "BTC_USDT", "price": "50000"}
            })))
            .await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pong_and_acks_are_consumed() {
        let (handler, registry) = handler(None);
        registry.insert("spot.trades", |_| async {
            panic!("control frames must not dispatch");
        });

        handler
            .process(TextPayload::Json(
                json!({"time": 1611541000, "channel": "spot.pong"}),
            ))
            .await;
        handler
            .process(TextPayload::Json(json!({
                "time": 1611541000,
                "channel": "spot.trades",
                "event": "subscribe",
                "result": {"status": "success"}
            })))
            .await;
    }

    #[tokio::test]
    async fn login_ack_sets_authenticated() {
        let (handler, _) = handler(Some(credentials()));
        assert!(!handler.authenticated.load(Ordering::Acquire));

        handler
            .process(TextPayload::Json(json!({
                "time": 1611541000,
                "channel": "spot.login",
                "event": "subscribe",
                "error": null,
                "result": {"status": "success"}
            })))
            .await;
        assert!(handler.authenticated.load(Ordering::Acquire));
    }

    #[tokio::test]
    async fn login_error_stays_unauthenticated() {
        let (handler, _) = handler(Some(credentials()));
        handler
            .process(TextPayload::Json(json!({
                "time": 1611541000,
                "channel": "spot.login",
                "event": "subscribe",
                "error": {"code": 2, "message": "invalid signature"}
            })))
            .await;
        assert!(!handler.authenticated.load(Ordering::Acquire));
    }

    #[test]
    fn subscribe_frame_shape() {
        let (handler, _) = handler(None);
        let frame = handler.subscribe_frame(
            &Subscription {
                channel: "spot.trades".to_string(),
                payload: vec!["BTC_USDT".to_string()],
                private: false,
            },
            "subscribe",
        );

        assert_eq!(frame["channel"], "spot.trades");
        assert_eq!(frame["event"], "subscribe");
        assert_eq!(frame["payload"][0], "BTC_USDT");
        assert!(frame["time"].is_i64());
        assert!(frame.get("auth").is_none());
    }

    #[test]
    fn private_subscribe_frame_carries_auth() {
        let (handler, _) = handler(Some(credentials()));
        let frame = handler.subscribe_frame(
            &Subscription {
                channel: "spot.orders".to_string(),
                payload: vec!["BTC_USDT".to_string()],
                private: true,
            },
            "subscribe",
        );

        assert_eq!(frame["auth"]["method"], "api_key");
        assert_eq!(frame["auth"]["KEY"], "key");
        // HMAC-SHA512 hex signature
        assert_eq!(frame["auth"]["SIGN"].as_str().unwrap().len(), 128);
    }

    #[test]
    fn login_frame_shape() {
        let (handler, _) = handler(Some(credentials()));
        let frame = handler.login_frame().unwrap();
        assert_eq!(frame["channel"], "spot.login");
        assert_eq!(frame["event"], "subscribe");
        assert_eq!(frame["auth"]["method"], "api_key");
    }

    #[test]
    fn missing_credentials_error() {
        let settings = Settings::default();
        let heartbeat = Arc::new(HeartBeat::new());
        let result =
            GateWebSocket::private_from_settings(GateMarket::Spot, &settings, heartbeat);
        assert!(matches!(
            result.unwrap_err(),
            ExchangeError::MissingCredentials { .. }
        ));
    }
}
