//! Sirocco gateway: exchange connectivity.
//!
//! Provides the building blocks for streaming market data and trading
//! over exchange APIs:
//! - [`heartbeat`]: cooperative 1-second tick scheduler
//! - [`ws`]: reconnecting WebSocket client with handler injection
//! - [`rest`]: pooled HTTP clients with request signing
//! - Exchange adapters: [`binance`], [`bybit`], [`gate`]

#![warn(missing_docs)]

pub mod heartbeat;
pub mod rest;
pub mod ws;

#[cfg(feature = "binance")]
pub mod binance;
#[cfg(feature = "bybit")]
pub mod bybit;
#[cfg(feature = "gate")]
pub mod gate;

pub use heartbeat::{HeartBeat, SchedulerError, TaskId};
pub use ws::{
    ConnectionState, SubscriptionRegistry, WebSocketClient, WebSocketConfig, WsHandler, WsSession,
};
