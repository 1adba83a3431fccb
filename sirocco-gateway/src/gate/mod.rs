//! Gate.io adapter.
//!
//! Covers the v4 spot and futures streams. All frames share the
//! `{time, id, channel, event, payload}` shape; the client pings with
//! a generated `{prefix}.ping` frame and authenticates private
//! channels with an HMAC-SHA512 signature over
//! `channel={c}&event={e}&time={t}`.

mod client;

pub use client::GateWebSocket;

/// Settlement currency for futures endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleCurrency {
    /// BTC-settled contracts.
    Btc,
    /// USDT-settled contracts.
    Usdt,
    /// USD-settled contracts.
    Usd,
}

impl SettleCurrency {
    /// Returns the URL path segment for this settlement currency.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Btc => "btc",
            Self::Usdt => "usdt",
            Self::Usd => "usd",
        }
    }
}

/// Gate.io market segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMarket {
    /// Spot market.
    Spot,
    /// Futures for a settlement currency.
    Futures(SettleCurrency),
}

impl GateMarket {
    /// Returns the WebSocket URL for this market.
    #[must_use]
    pub fn url(&self) -> String {
        match self {
            Self::Spot => "wss://api.gateio.ws/ws/v4/".to_string(),
            Self::Futures(settle) => {
                format!("wss://fx-ws.gateio.ws/v4/ws/{}", settle.as_str())
            }
        }
    }

    /// Returns the channel prefix (`spot` or `futures`).
    #[must_use]
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::Futures(_) => "futures",
        }
    }

    /// Builds a fully qualified channel name, e.g. `spot.trades`.
    #[must_use]
    pub fn channel(&self, name: &str) -> String {
        format!("{}.{name}", self.prefix())
    }

    /// Ticker channel.
    #[must_use]
    pub fn tickers(&self) -> String {
        self.channel("tickers")
    }

    /// Public trades channel.
    #[must_use]
    pub fn trades(&self) -> String {
        self.channel("trades")
    }

    /// Candlestick channel.
    #[must_use]
    pub fn candlesticks(&self) -> String {
        self.channel("candlesticks")
    }

    /// Order book channel.
    #[must_use]
    pub fn order_book(&self) -> String {
        self.channel("order_book")
    }

    /// Best bid/ask channel.
    #[must_use]
    pub fn book_ticker(&self) -> String {
        self.channel("book_ticker")
    }

    /// Private order updates channel.
    #[must_use]
    pub fn orders(&self) -> String {
        self.channel("orders")
    }

    /// Private fills channel.
    #[must_use]
    pub fn usertrades(&self) -> String {
        self.channel("usertrades")
    }

    /// Private balance channel (`spot.balances` / `futures.balances`).
    #[must_use]
    pub fn balances(&self) -> String {
        self.channel("balances")
    }

    /// Private position updates channel (futures only).
    #[must_use]
    pub fn positions(&self) -> String {
        self.channel("positions")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        assert_eq!(GateMarket::Spot.url(), "wss://api.gateio.ws/ws/v4/");
        assert_eq!(
            GateMarket::Futures(SettleCurrency::Usdt).url(),
            "wss://fx-ws.gateio.ws/v4/ws/usdt"
        );
        assert_eq!(
            GateMarket::Futures(SettleCurrency::Btc).url(),
            "wss://fx-ws.gateio.ws/v4/ws/btc"
        );
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(GateMarket::Spot.trades(), "spot.trades");
        assert_eq!(GateMarket::Spot.orders(), "spot.orders");
        assert_eq!(
            GateMarket::Futures(SettleCurrency::Usdt).order_book(),
            "futures.order_book"
        );
        assert_eq!(
            GateMarket::Futures(SettleCurrency::Btc).positions(),
            "futures.positions"
        );
    }
}
