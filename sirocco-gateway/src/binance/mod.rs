//! Binance adapter.
//!
//! Covers the spot and USD-margined futures market streams. Binance
//! carries the subscription list in the URL (single stream or combined
//! stream endpoint) and also accepts SUBSCRIBE/UNSUBSCRIBE frames on
//! an open connection. The server pings the client, so no application
//! heartbeat is sent.

mod client;
mod streams;

pub use client::{BinanceWebSocket, DEFAULT_STREAM_KEY};
pub use streams::{
    agg_trade, all_book_tickers, all_force_orders, all_mini_tickers, book_ticker, depth,
    force_order, kline, mark_price, mark_price_1s, mini_ticker, BinanceMarket,
};
