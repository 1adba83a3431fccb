//! Reconnecting WebSocket client.

use crate::heartbeat::{HeartBeat, SchedulerError, TaskId};
use crate::ws::config::WebSocketConfig;
use crate::ws::handler::{HeartbeatPayload, TextPayload, WsHandler};
use crate::ws::session::WsSession;
use crate::ws::state::ConnectionState;
use futures::stream::SplitStream;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use sirocco_core::NetworkError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};
use url::Url;

type WsStream = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

#[derive(Default)]
struct ClientTasks {
    liveness: Option<TaskId>,
    heartbeat: Option<TaskId>,
}

/// WebSocket client with scheduler-driven liveness checks, application
/// heartbeats and linear-backoff reconnection.
///
/// Message semantics come from the injected [`WsHandler`]; the client
/// owns everything else about the connection lifecycle.
///
/// # Example
///
/// ```rust,ignore
/// let client = Arc::new(WebSocketClient::new(config, handler, heartbeat));
/// client.start()?;
/// ```
pub struct WebSocketClient {
    config: WebSocketConfig,
    session: WsSession,
    handler: Arc<dyn WsHandler>,
    heartbeat: Arc<HeartBeat>,
    heartbeat_payload: Option<HeartbeatPayload>,
    tasks: Mutex<ClientTasks>,
    reconnect_in_flight: AtomicBool,
}

impl WebSocketClient {
    /// Creates a client. The connection is not opened until
    /// [`start`](Self::start) or [`connect`](Self::connect) is called.
    #[must_use]
    pub fn new(
        config: WebSocketConfig,
        handler: Arc<dyn WsHandler>,
        heartbeat: Arc<HeartBeat>,
    ) -> Self {
        let session = WsSession::new(config.url.clone());
        Self {
            config,
            session,
            handler,
            heartbeat,
            heartbeat_payload: None,
            tasks: Mutex::new(ClientTasks::default()),
            reconnect_in_flight: AtomicBool::new(false),
        }
    }

    /// Sets the application heartbeat payload.
    #[must_use]
    pub fn with_heartbeat_payload(mut self, payload: HeartbeatPayload) -> Self {
        self.heartbeat_payload = Some(payload);
        self
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Returns the session handle.
    #[must_use]
    pub fn session(&self) -> &WsSession {
        &self.session
    }

    /// Returns the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }

    /// Returns true if the connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Returns the reconnect attempts since the last good connection.
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.session.reconnect_attempts()
    }

    /// Registers the scheduler tasks and opens the connection in the
    /// background.
    ///
    /// Two tasks are registered: a liveness check on
    /// `liveness_interval_ticks` and, unless disabled, an application
    /// heartbeat on `heartbeat_interval_ticks`.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured task interval is invalid.
    pub fn start(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let liveness = {
            let weak = Arc::downgrade(self);
            self.heartbeat
                .register(self.config.liveness_interval_ticks, move || {
                    let weak = Weak::clone(&weak);
                    async move {
                        if let Some(client) = weak.upgrade() {
                            client.check_connection().await;
                        }
                        Ok(())
                    }
                })?
        };

        let heartbeat = if self.config.heartbeat_interval_ticks > 0 {
            let weak = Arc::downgrade(self);
            Some(
                self.heartbeat
                    .register(self.config.heartbeat_interval_ticks, move || {
                        let weak = Weak::clone(&weak);
                        async move {
                            if let Some(client) = weak.upgrade() {
                                client.send_heartbeat().await;
                            }
                            Ok(())
                        }
                    })?,
            )
        } else {
            None
        };

        {
            let mut tasks = self.tasks.lock();
            tasks.liveness = Some(liveness);
            tasks.heartbeat = heartbeat;
        }

        let client = Arc::clone(self);
        tokio::spawn(async move {
            client.connect().await;
        });
        Ok(())
    }

    /// Opens the connection.
    ///
    /// Returns true when the connection is established and the receive
    /// loop is running. A call while already connecting or connected
    /// logs a warning and returns false.
    pub async fn connect(self: &Arc<Self>) -> bool {
        {
            let mut state = self.session.internal().write();
            if matches!(
                state.state,
                ConnectionState::Connecting | ConnectionState::Connected
            ) {
                drop(state);
                warn!(
                    exchange = %self.config.exchange,
                    url = %self.config.url,
                    state = %self.state(),
                    "connect skipped: already active"
                );
                return false;
            }
            state.mark_connecting();
        }

        info!(exchange = %self.config.exchange, url = %self.config.url, "connecting");

        match self.dial().await {
            Ok(stream) => {
                let (sink, stream) = stream.split();
                self.session.install_sink(sink).await;
                self.session.internal().write().mark_connected();
                info!(exchange = %self.config.exchange, url = %self.config.url, "connected");

                self.handler.on_connect(&self.session).await;

                let weak = Arc::downgrade(self);
                tokio::spawn(async move {
                    Self::receive_loop(weak, stream).await;
                });
                true
            }
            Err(e) => {
                error!(
                    exchange = %self.config.exchange,
                    url = %self.config.url,
                    error = %e,
                    "connection failed"
                );
                self.session.internal().write().mark_disconnected();
                false
            }
        }
    }

    async fn dial(&self) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, NetworkError> {
        let mut request =
            self.config
                .url
                .as_str()
                .into_client_request()
                .map_err(|e| NetworkError::ConnectionFailed {
                    reason: format!("invalid URL: {e}"),
                })?;

        for (name, value) in &self.config.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                NetworkError::ConnectionFailed {
                    reason: format!("invalid header name '{name}': {e}"),
                }
            })?;
            let value =
                HeaderValue::from_str(value).map_err(|e| NetworkError::ConnectionFailed {
                    reason: format!("invalid header value: {e}"),
                })?;
            request.headers_mut().insert(name, value);
        }

        let connect_timeout = self.config.connect_timeout();

        let handshake = if let Some(proxy) = &self.config.proxy {
            let uri = request.uri();
            let host = uri
                .host()
                .ok_or_else(|| NetworkError::ConnectionFailed {
                    reason: "URL has no host".to_string(),
                })?
                .to_string();
            let port = uri
                .port_u16()
                .unwrap_or(if uri.scheme_str() == Some("wss") { 443 } else { 80 });

            let tunnel = timeout(connect_timeout, open_proxy_tunnel(proxy, &host, port))
                .await
                .map_err(|_| NetworkError::Timeout {
                    timeout_ms: self.config.connect_timeout_ms,
                })??;

            timeout(connect_timeout, client_async_tls(request, tunnel)).await
        } else {
            timeout(connect_timeout, connect_async(request)).await
        };

        let (stream, response) = handshake
            .map_err(|_| NetworkError::Timeout {
                timeout_ms: self.config.connect_timeout_ms,
            })?
            .map_err(map_ws_error)?;

        debug!(status = %response.status(), "websocket handshake complete");
        Ok(stream)
    }

    async fn receive_loop(weak: Weak<Self>, mut stream: WsStream) {
        while let Some(message) = stream.next().await {
            // hold the client only while processing one message so
            // dropping the last external Arc tears the loop down
            let Some(client) = weak.upgrade() else {
                return;
            };

            match message {
                Ok(Message::Text(text)) => {
                    client.session.internal().write().record_message();
                    client.handler.process(TextPayload::parse(text)).await;
                }
                Ok(Message::Binary(data)) => {
                    client.session.internal().write().record_message();
                    client.handler.process_binary(data).await;
                }
                Ok(Message::Ping(data)) => {
                    let mut sink = client.session.sink().lock().await;
                    if let Some(sink) = sink.as_mut() {
                        if let Err(e) = sink.send(Message::Pong(data)).await {
                            warn!(error = %e, "failed to answer ping");
                        }
                    }
                }
                Ok(Message::Pong(_)) => {
                    debug!(exchange = %client.config.exchange, "pong received");
                }
                Ok(Message::Close(frame)) => {
                    info!(
                        exchange = %client.config.exchange,
                        frame = ?frame,
                        "close frame received"
                    );
                    break;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    error!(exchange = %client.config.exchange, error = %e, "receive error");
                    break;
                }
            }
        }

        if let Some(client) = weak.upgrade() {
            client.session.stream_alive().store(false, Ordering::Release);
            client.handle_disconnect().await;
        }
    }

    /// Reacts to a lost connection: clears the sink, notifies the
    /// handler and kicks off reconnection if enabled. Does nothing
    /// once the client is closed.
    async fn handle_disconnect(self: &Arc<Self>) {
        {
            let mut state = self.session.internal().write();
            if state.state.is_closed() {
                return;
            }
            state.mark_disconnected();
        }

        warn!(exchange = %self.config.exchange, url = %self.config.url, "disconnected");
        self.session.clear_sink().await;
        self.handler.on_disconnect().await;

        if self.config.auto_reconnect {
            let client = Arc::clone(self);
            tokio::spawn(async move {
                client.run_reconnect_loop().await;
            });
        }
    }

    /// Retries the connection with linear backoff until it succeeds,
    /// attempts are exhausted, or the client is closed.
    ///
    /// Returns a boxed future so the compiler can resolve `Send` for
    /// the spawn cycle `connect` -> `receive_loop` ->
    /// `handle_disconnect` -> `run_reconnect_loop` -> `connect`.
    fn run_reconnect_loop(
        self: &Arc<Self>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>> {
        let client = Arc::clone(self);
        Box::pin(async move {
            client.run_reconnect_loop_inner().await;
        })
    }

    async fn run_reconnect_loop_inner(self: &Arc<Self>) {
        // single loop at a time
        if self
            .reconnect_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        loop {
            let attempts = self.session.reconnect_attempts();
            if !self.config.should_reconnect(attempts) {
                warn!(
                    exchange = %self.config.exchange,
                    url = %self.config.url,
                    attempts,
                    "reconnect attempts exhausted"
                );
                break;
            }

            if self.state().is_closed() {
                break;
            }

            let attempt = self.session.internal().write().mark_reconnecting();
            let delay = self.config.calculate_reconnect_delay(attempt);
            info!(
                exchange = %self.config.exchange,
                url = %self.config.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );
            tokio::time::sleep(delay).await;

            // closed while waiting out the backoff
            if self.state().is_closed() {
                break;
            }

            if self.connect().await {
                break;
            }
        }

        self.reconnect_in_flight.store(false, Ordering::Release);
    }

    /// Liveness check fired by the scheduler: if the receive loop died
    /// without the state noticing, trigger the disconnect path.
    async fn check_connection(self: &Arc<Self>) {
        let alive = self.session.stream_alive().load(Ordering::Acquire);
        if !alive && self.state() == ConnectionState::Connected {
            warn!(
                exchange = %self.config.exchange,
                url = %self.config.url,
                "liveness check failed"
            );
            self.handle_disconnect().await;
        }
    }

    /// Sends the configured application heartbeat, if any.
    async fn send_heartbeat(&self) {
        if !self.is_connected() {
            return;
        }
        if let Some(payload) = &self.heartbeat_payload {
            let frame = payload.render();
            debug!(exchange = %self.config.exchange, "sending heartbeat");
            self.session.send_text(frame).await;
        }
    }

    /// Closes the connection permanently.
    ///
    /// Unregisters both scheduler tasks and moves the client into the
    /// terminal closed state; no reconnection will happen. Safe to
    /// call more than once.
    pub async fn disconnect(&self) {
        self.session.internal().write().mark_closed();

        let (liveness, heartbeat) = {
            let mut tasks = self.tasks.lock();
            (tasks.liveness.take(), tasks.heartbeat.take())
        };
        if let Some(id) = liveness {
            self.heartbeat.unregister(id);
        }
        if let Some(id) = heartbeat {
            self.heartbeat.unregister(id);
        }

        self.session.clear_sink().await;
        info!(exchange = %self.config.exchange, url = %self.config.url, "closed");
    }

    /// Sends a text frame. Returns false if disconnected or the send
    /// fails.
    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        self.session.send_text(text).await
    }

    /// Serializes a value to JSON and sends it. Returns false on
    /// failure.
    pub async fn send_json<T: Serialize>(&self, value: &T) -> bool {
        self.session.send_json(value).await
    }
}

impl std::fmt::Debug for WebSocketClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketClient")
            .field("url", &self.config.url)
            .field("exchange", &self.config.exchange)
            .field("state", &self.state())
            .finish()
    }
}

fn map_ws_error(error: WsError) -> NetworkError {
    match error {
        WsError::Tls(e) => NetworkError::Tls {
            reason: e.to_string(),
        },
        WsError::Io(e) => NetworkError::ConnectionFailed {
            reason: e.to_string(),
        },
        WsError::Http(response) => NetworkError::Http {
            status_code: response.status().as_u16(),
            reason: "handshake rejected".to_string(),
        },
        other => NetworkError::WebSocket {
            reason: other.to_string(),
        },
    }
}

/// Establishes an HTTP CONNECT tunnel through a proxy.
async fn open_proxy_tunnel(
    proxy: &str,
    target_host: &str,
    target_port: u16,
) -> Result<TcpStream, NetworkError> {
    let proxy_url = Url::parse(proxy).map_err(|e| NetworkError::Proxy {
        reason: format!("invalid proxy URL '{proxy}': {e}"),
    })?;
    let proxy_host = proxy_url.host_str().ok_or_else(|| NetworkError::Proxy {
        reason: format!("proxy URL '{proxy}' has no host"),
    })?;
    let proxy_port = proxy_url.port_or_known_default().unwrap_or(80);

    let mut stream = TcpStream::connect((proxy_host, proxy_port))
        .await
        .map_err(|e| NetworkError::Proxy {
            reason: format!("proxy connect failed: {e}"),
        })?;

    let connect_request = format!(
        "CONNECT {target_host}:{target_port} HTTP/1.1\r\nHost: {target_host}:{target_port}\r\n\r\n"
    );
    stream
        .write_all(connect_request.as_bytes())
        .await
        .map_err(|e| NetworkError::Proxy {
            reason: format!("proxy write failed: {e}"),
        })?;

    // read until the end of the response headers
    let mut response = Vec::with_capacity(256);
    let mut buf = [0u8; 256];
    loop {
        let n = stream
            .read(&mut buf)
            .await
            .map_err(|e| NetworkError::Proxy {
                reason: format!("proxy read failed: {e}"),
            })?;
        if n == 0 {
            return Err(NetworkError::Proxy {
                reason: "proxy closed connection during CONNECT".to_string(),
            });
        }
        response.extend_from_slice(&buf[..n]);
        if response.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
        if response.len() > 8192 {
            return Err(NetworkError::Proxy {
                reason: "proxy CONNECT response too large".to_string(),
            });
        }
    }

    let status_line = String::from_utf8_lossy(&response);
    let status_line = status_line.lines().next().unwrap_or_default();
    if !status_line.contains(" 200") {
        return Err(NetworkError::Proxy {
            reason: format!("proxy CONNECT rejected: {status_line}"),
        });
    }

    Ok(stream)
}
