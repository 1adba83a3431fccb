//! Reconnecting WebSocket client.
//!
//! The client owns the connection lifecycle: dialing (optionally
//! through an HTTP CONNECT proxy), the receive loop, protocol
//! ping/pong, liveness checks and application heartbeats driven by the
//! shared [`HeartBeat`](crate::heartbeat::HeartBeat), and linear-backoff
//! reconnection. Message semantics are injected through a
//! [`WsHandler`] implementation; exchange adapters pair the handler
//! with a [`SubscriptionRegistry`] to route stream updates to
//! callbacks.

mod client;
mod config;
mod handler;
mod registry;
mod session;
mod state;

pub use client::WebSocketClient;
pub use config::{WebSocketConfig, WebSocketConfigBuilder};
pub use handler::{HeartbeatPayload, TextPayload, WsHandler};
pub use registry::SubscriptionRegistry;
pub use session::WsSession;
pub use state::ConnectionState;
