//! Connection lifecycle tests against a local WebSocket server.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use sirocco_gateway::heartbeat::HeartBeat;
use sirocco_gateway::ws::{
    ConnectionState, TextPayload, WebSocketClient, WebSocketConfig, WsHandler,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

struct RecordingHandler {
    messages: parking_lot::Mutex<Vec<String>>,
    disconnects: AtomicUsize,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            messages: parking_lot::Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl WsHandler for RecordingHandler {
    async fn on_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn process(&self, payload: TextPayload) {
        let text = match payload {
            TextPayload::Json(value) => value.to_string(),
            TextPayload::Raw(text) => text,
        };
        self.messages.lock().push(text);
    }
}

/// Test server behavior per accepted connection.
#[derive(Clone, Copy, PartialEq)]
enum ServerMode {
    /// Keep the connection open and echo text frames.
    Hold,
    /// Close the connection right after the handshake.
    CloseImmediately,
    /// Close the first connection, hold the rest.
    CloseFirstThenHold,
}

struct TestServer {
    addr: SocketAddr,
    accepts: Arc<AtomicUsize>,
    shutdown: Arc<Notify>,
}

impl TestServer {
    async fn spawn(mode: ServerMode) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepts = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        let accepts2 = Arc::clone(&accepts);
        let shutdown2 = Arc::clone(&shutdown);
        tokio::spawn(async move {
            loop {
                let stream = tokio::select! {
                    accepted = listener.accept() => match accepted {
                        Ok((stream, _)) => stream,
                        Err(_) => return,
                    },
                    () = shutdown2.notified() => return,
                };
                let n = accepts2.fetch_add(1, Ordering::SeqCst) + 1;

                let close = match mode {
                    ServerMode::Hold => false,
                    ServerMode::CloseImmediately => true,
                    ServerMode::CloseFirstThenHold => n == 1,
                };

                tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                        return;
                    };
                    if close {
                        let _ = ws.close(None).await;
                        return;
                    }
                    while let Some(Ok(msg)) = ws.next().await {
                        if msg.is_text() && ws.send(msg).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });

        Self {
            addr,
            accepts,
            shutdown,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    fn accept_count(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.shutdown.notify_one();
    }
}

fn test_config(url: String) -> WebSocketConfig {
    WebSocketConfig::builder()
        .url(url)
        .exchange("test")
        .reconnect_delay_step_ms(50)
        .max_reconnect_delay_ms(200)
        .build()
}

async fn wait_for<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn connect_is_rejected_while_connected() {
    let server = TestServer::spawn(ServerMode::Hold).await;
    let handler = RecordingHandler::new();
    let heartbeat = Arc::new(HeartBeat::new());
    let client = Arc::new(WebSocketClient::new(
        test_config(server.url()),
        handler,
        heartbeat,
    ));

    assert!(client.connect().await);
    assert_eq!(client.state(), ConnectionState::Connected);

    // a second connect on a live connection is refused
    assert!(!client.connect().await);
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(server.accept_count(), 1);

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn echo_roundtrip_reaches_handler() {
    let server = TestServer::spawn(ServerMode::Hold).await;
    let handler = RecordingHandler::new();
    let heartbeat = Arc::new(HeartBeat::new());
    let client = Arc::new(WebSocketClient::new(
        test_config(server.url()),
        Arc::clone(&handler) as Arc<dyn WsHandler>,
        heartbeat,
    ));

    assert!(client.connect().await);
    assert!(client.send_json(&serde_json::json!({"op": "ping"})).await);

    assert!(
        wait_for(
            || !handler.messages.lock().is_empty(),
            Duration::from_secs(2)
        )
        .await
    );
    assert_eq!(handler.messages.lock()[0], r#"{"op":"ping"}"#);

    client.disconnect().await;
}

#[tokio::test]
async fn reconnects_after_server_close() {
    let server = TestServer::spawn(ServerMode::CloseFirstThenHold).await;
    let handler = RecordingHandler::new();
    let heartbeat = Arc::new(HeartBeat::new());
    let client = Arc::new(WebSocketClient::new(
        test_config(server.url()),
        Arc::clone(&handler) as Arc<dyn WsHandler>,
        heartbeat,
    ));

    assert!(client.connect().await);

    // wait until the server-side close has been observed, so the
    // Connected state checked below is the reconnected one
    let handler2 = Arc::clone(&handler);
    wait_for(
        move || handler2.disconnects.load(Ordering::SeqCst) >= 1,
        Duration::from_secs(5),
    )
    .await;

    // first connection is closed by the server; the client comes back
    let client2 = Arc::clone(&client);
    assert!(
        wait_for(
            move || client2.state() == ConnectionState::Connected
                && client2.reconnect_attempts() == 0,
            Duration::from_secs(5)
        )
        .await
    );
    assert!(server.accept_count() >= 2);
    assert_eq!(handler.disconnects.load(Ordering::SeqCst), 1);

    client.disconnect().await;
}

#[tokio::test]
async fn disconnect_during_backoff_stays_closed() {
    let server = TestServer::spawn(ServerMode::CloseImmediately).await;
    let handler = RecordingHandler::new();
    let heartbeat = Arc::new(HeartBeat::new());
    let config = WebSocketConfig::builder()
        .url(server.url())
        .exchange("test")
        .reconnect_delay_step_ms(5_000)
        .build();
    let client = Arc::new(WebSocketClient::new(config, handler, heartbeat));

    assert!(client.connect().await);

    let client2 = Arc::clone(&client);
    assert!(
        wait_for(
            move || client2.state() == ConnectionState::Reconnecting,
            Duration::from_secs(2)
        )
        .await
    );

    client.disconnect().await;
    assert_eq!(client.state(), ConnectionState::Closed);

    // backoff expiry must not revive the connection
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert_eq!(server.accept_count(), 1);
}

#[tokio::test]
async fn reconnect_attempts_are_exhausted() {
    let server = TestServer::spawn(ServerMode::CloseImmediately).await;
    let handler = RecordingHandler::new();
    let heartbeat = Arc::new(HeartBeat::new());
    let config = WebSocketConfig::builder()
        .url(server.url())
        .exchange("test")
        .reconnect_delay_step_ms(20)
        .max_reconnect_attempts(2)
        .build();
    let client = Arc::new(WebSocketClient::new(config, handler, heartbeat));

    assert!(client.connect().await);

    // kill the server so every retry fails
    server.stop();

    let client2 = Arc::clone(&client);
    assert!(
        wait_for(
            move || client2.reconnect_attempts() == 2
                && client2.state() == ConnectionState::Disconnected,
            Duration::from_secs(5)
        )
        .await
    );

    // exhaustion leaves the client disconnected, not closed
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.reconnect_attempts(), 2);
}
