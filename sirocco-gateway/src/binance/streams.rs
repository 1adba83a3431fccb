//! Binance stream names and endpoint URLs.

/// Binance market segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinanceMarket {
    /// Spot market.
    Spot,
    /// USD-margined futures.
    UsdFutures,
}

impl BinanceMarket {
    /// Returns the WebSocket host for this market.
    #[must_use]
    pub fn host(&self) -> &'static str {
        match self {
            Self::Spot => "wss://stream.binance.com:9443",
            Self::UsdFutures => "wss://fstream.binance.com",
        }
    }

    /// Builds the connection URL for the given streams.
    ///
    /// One stream uses the raw endpoint, several use the combined
    /// endpoint whose messages arrive wrapped in a
    /// `{"stream": ..., "data": ...}` envelope.
    #[must_use]
    pub fn build_url(&self, streams: &[&str]) -> String {
        match streams {
            [] => format!("{}/ws", self.host()),
            [single] => format!("{}/ws/{single}", self.host()),
            many => format!("{}/stream?streams={}", self.host(), many.join("/")),
        }
    }
}

/// Aggregate trade stream: `{symbol}@aggTrade`.
#[must_use]
pub fn agg_trade(symbol: &str) -> String {
    format!("{}@aggTrade", symbol.to_lowercase())
}

/// Kline stream: `{symbol}@kline_{interval}`.
#[must_use]
pub fn kline(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{interval}", symbol.to_lowercase())
}

/// Mini ticker stream: `{symbol}@miniTicker`.
#[must_use]
pub fn mini_ticker(symbol: &str) -> String {
    format!("{}@miniTicker", symbol.to_lowercase())
}

/// All-market mini tickers: `!miniTicker@arr`.
#[must_use]
pub fn all_mini_tickers() -> String {
    "!miniTicker@arr".to_string()
}

/// Best bid/ask stream: `{symbol}@bookTicker`.
#[must_use]
pub fn book_ticker(symbol: &str) -> String {
    format!("{}@bookTicker", symbol.to_lowercase())
}

/// All-market best bid/ask: `!bookTicker`.
#[must_use]
pub fn all_book_tickers() -> String {
    "!bookTicker".to_string()
}

/// Partial book depth stream: `{symbol}@depth{levels}`, with 100ms
/// updates when `fast` is set.
#[must_use]
pub fn depth(symbol: &str, levels: u32, fast: bool) -> String {
    let base = format!("{}@depth{levels}", symbol.to_lowercase());
    if fast {
        format!("{base}@100ms")
    } else {
        base
    }
}

/// Futures mark price stream: `{symbol}@markPrice` (3 second updates).
#[must_use]
pub fn mark_price(symbol: &str) -> String {
    format!("{}@markPrice", symbol.to_lowercase())
}

/// Futures mark price stream with 1 second updates.
#[must_use]
pub fn mark_price_1s(symbol: &str) -> String {
    format!("{}@markPrice@1s", symbol.to_lowercase())
}

/// Futures liquidation order stream: `{symbol}@forceOrder`.
#[must_use]
pub fn force_order(symbol: &str) -> String {
    format!("{}@forceOrder", symbol.to_lowercase())
}

/// All-market liquidation orders: `!forceOrder@arr`.
#[must_use]
pub fn all_force_orders() -> String {
    "!forceOrder@arr".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names_lowercase_symbol() {
        assert_eq!(agg_trade("BTCUSDT"), "btcusdt@aggTrade");
        assert_eq!(kline("ETHUSDT", "1m"), "ethusdt@kline_1m");
        assert_eq!(mini_ticker("BTCUSDT"), "btcusdt@miniTicker");
        assert_eq!(book_ticker("BTCUSDT"), "btcusdt@bookTicker");
        assert_eq!(depth("BTCUSDT", 20, false), "btcusdt@depth20");
        assert_eq!(depth("BTCUSDT", 5, true), "btcusdt@depth5@100ms");
        assert_eq!(mark_price("BTCUSDT"), "btcusdt@markPrice");
        assert_eq!(mark_price_1s("BTCUSDT"), "btcusdt@markPrice@1s");
        assert_eq!(force_order("BTCUSDT"), "btcusdt@forceOrder");
    }

    #[test]
    fn test_single_stream_url() {
        let url = BinanceMarket::Spot.build_url(&["btcusdt@aggTrade"]);
        assert_eq!(url, "wss://stream.binance.com:9443/ws/btcusdt@aggTrade");
    }

    #[test]
    fn test_combined_stream_url() {
        let url = BinanceMarket::UsdFutures
            .build_url(&["btcusdt@aggTrade", "ethusdt@kline_1m"]);
        assert_eq!(
            url,
            "wss://fstream.binance.com/stream?streams=btcusdt@aggTrade/ethusdt@kline_1m"
        );
    }

    #[test]
    fn test_empty_stream_url() {
        assert_eq!(
            BinanceMarket::Spot.build_url(&[]),
            "wss://stream.binance.com:9443/ws"
        );
    }
}
