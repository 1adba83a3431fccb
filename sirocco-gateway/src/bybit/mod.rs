//! Bybit adapter.
//!
//! Covers the v5 public market streams per product category and the
//! private account stream. The client pings with `{"op":"ping"}` every
//! 20 ticks; the private stream authenticates on connect with an
//! HMAC-SHA256 signature over `GET/realtime{expires}`.

mod client;

pub use client::{BybitWebSocket, TOPIC_EXECUTION, TOPIC_ORDER, TOPIC_POSITION, TOPIC_WALLET};

/// Bybit v5 product category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BybitCategory {
    /// Spot market.
    Spot,
    /// USDT/USDC perpetuals and futures.
    Linear,
    /// Inverse contracts.
    Inverse,
    /// Options.
    Option,
}

impl BybitCategory {
    /// Returns the URL path segment for this category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Linear => "linear",
            Self::Inverse => "inverse",
            Self::Option => "option",
        }
    }
}

/// Bybit stream endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BybitChannel {
    /// Public market data for a product category.
    Public(BybitCategory),
    /// Private account stream.
    Private,
}

impl BybitChannel {
    /// Returns the WebSocket URL for this endpoint.
    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Public(category) => {
                format!("wss://stream.bybit.com/v5/public/{}", category.as_str())
            }
            Self::Private => "wss://stream.bybit.com/v5/private".to_string(),
        }
    }
}

/// Order book topic: `orderbook.{depth}.{symbol}`.
#[must_use]
pub fn orderbook(depth: u32, symbol: &str) -> String {
    format!("orderbook.{depth}.{symbol}")
}

/// Public trade topic: `publicTrade.{symbol}`.
#[must_use]
pub fn public_trade(symbol: &str) -> String {
    format!("publicTrade.{symbol}")
}

/// Kline topic: `kline.{interval}.{symbol}`.
#[must_use]
pub fn kline(interval: &str, symbol: &str) -> String {
    format!("kline.{interval}.{symbol}")
}

/// Ticker topic: `tickers.{symbol}`.
#[must_use]
pub fn tickers(symbol: &str) -> String {
    format!("tickers.{symbol}")
}
