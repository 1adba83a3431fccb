//! WebSocket client configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// WebSocket client configuration.
///
/// # Examples
///
/// ```
/// use sirocco_gateway::ws::WebSocketConfig;
///
/// let config = WebSocketConfig::builder()
///     .url("wss://stream.bybit.com/v5/public/spot")
///     .exchange("bybit")
///     .heartbeat_interval_ticks(20)
///     .build();
/// assert_eq!(config.exchange, "bybit");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// WebSocket endpoint URL.
    pub url: String,

    /// Extra headers sent with the upgrade request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// HTTP CONNECT proxy URL, e.g. `http://127.0.0.1:7890`.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Connect timeout in milliseconds.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Ticks between liveness checks of the receive loop.
    #[serde(default = "default_liveness_interval_ticks")]
    pub liveness_interval_ticks: u64,

    /// Ticks between application heartbeats. 0 disables them.
    #[serde(default = "default_heartbeat_interval_ticks")]
    pub heartbeat_interval_ticks: u64,

    /// Whether to reconnect automatically after a lost connection.
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Maximum reconnect attempts. 0 means unlimited.
    #[serde(default)]
    pub max_reconnect_attempts: u32,

    /// Backoff added per attempt, in milliseconds.
    #[serde(default = "default_reconnect_delay_step_ms")]
    pub reconnect_delay_step_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,

    /// Exchange name used in log lines.
    #[serde(default)]
    pub exchange: String,
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_liveness_interval_ticks() -> u64 {
    10
}

fn default_heartbeat_interval_ticks() -> u64 {
    10
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_step_ms() -> u64 {
    2_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: HashMap::new(),
            proxy: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            liveness_interval_ticks: default_liveness_interval_ticks(),
            heartbeat_interval_ticks: default_heartbeat_interval_ticks(),
            auto_reconnect: default_auto_reconnect(),
            max_reconnect_attempts: 0,
            reconnect_delay_step_ms: default_reconnect_delay_step_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
            exchange: String::new(),
        }
    }
}

impl WebSocketConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> WebSocketConfigBuilder {
        WebSocketConfigBuilder::default()
    }

    /// Returns the connect timeout as a `Duration`.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Returns the backoff delay before the given 1-based attempt.
    ///
    /// The delay grows linearly with the attempt number and is capped
    /// at `max_reconnect_delay_ms`.
    #[must_use]
    pub fn calculate_reconnect_delay(&self, attempt: u32) -> Duration {
        let delay_ms = u64::from(attempt)
            .saturating_mul(self.reconnect_delay_step_ms)
            .min(self.max_reconnect_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Returns true if another reconnect attempt is allowed.
    #[must_use]
    pub fn should_reconnect(&self, attempts_so_far: u32) -> bool {
        self.auto_reconnect
            && (self.max_reconnect_attempts == 0 || attempts_so_far < self.max_reconnect_attempts)
    }
}

/// Builder for [`WebSocketConfig`].
#[derive(Debug, Clone, Default)]
pub struct WebSocketConfigBuilder {
    config: WebSocketConfig,
}

impl WebSocketConfigBuilder {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.config.url = url.into();
        self
    }

    /// Adds an upgrade request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the HTTP CONNECT proxy URL.
    #[must_use]
    pub fn proxy(mut self, proxy: Option<String>) -> Self {
        self.config.proxy = proxy;
        self
    }

    /// Sets the connect timeout in milliseconds.
    #[must_use]
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Sets the liveness check interval in ticks.
    #[must_use]
    pub fn liveness_interval_ticks(mut self, ticks: u64) -> Self {
        self.config.liveness_interval_ticks = ticks;
        self
    }

    /// Sets the application heartbeat interval in ticks. 0 disables.
    #[must_use]
    pub fn heartbeat_interval_ticks(mut self, ticks: u64) -> Self {
        self.config.heartbeat_interval_ticks = ticks;
        self
    }

    /// Enables or disables automatic reconnection.
    #[must_use]
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.config.auto_reconnect = enabled;
        self
    }

    /// Sets the maximum reconnect attempts. 0 means unlimited.
    #[must_use]
    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the per-attempt backoff step in milliseconds.
    #[must_use]
    pub fn reconnect_delay_step_ms(mut self, ms: u64) -> Self {
        self.config.reconnect_delay_step_ms = ms;
        self
    }

    /// Sets the backoff ceiling in milliseconds.
    #[must_use]
    pub fn max_reconnect_delay_ms(mut self, ms: u64) -> Self {
        self.config.max_reconnect_delay_ms = ms;
        self
    }

    /// Sets the exchange name used in log lines.
    #[must_use]
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.config.exchange = exchange.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> WebSocketConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WebSocketConfig::default();
        assert_eq!(config.connect_timeout_ms, 10_000);
        assert_eq!(config.liveness_interval_ticks, 10);
        assert_eq!(config.heartbeat_interval_ticks, 10);
        assert!(config.auto_reconnect);
        assert_eq!(config.max_reconnect_attempts, 0);
    }

    #[test]
    fn test_linear_backoff() {
        let config = WebSocketConfig::default();
        assert_eq!(config.calculate_reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(config.calculate_reconnect_delay(2), Duration::from_secs(4));
        assert_eq!(config.calculate_reconnect_delay(14), Duration::from_secs(28));
        // capped at 30s from attempt 15 onward
        assert_eq!(config.calculate_reconnect_delay(15), Duration::from_secs(30));
        assert_eq!(config.calculate_reconnect_delay(100), Duration::from_secs(30));
    }

    #[test]
    fn test_should_reconnect() {
        let unlimited = WebSocketConfig::default();
        assert!(unlimited.should_reconnect(0));
        assert!(unlimited.should_reconnect(1_000));

        let capped = WebSocketConfig::builder().max_reconnect_attempts(3).build();
        assert!(capped.should_reconnect(2));
        assert!(!capped.should_reconnect(3));

        let disabled = WebSocketConfig::builder().auto_reconnect(false).build();
        assert!(!disabled.should_reconnect(0));
    }

    #[test]
    fn test_builder() {
        let config = WebSocketConfig::builder()
            .url("wss://example.com/ws")
            .header("User-Agent", "Sirocco")
            .proxy(Some("http://127.0.0.1:7890".to_string()))
            .heartbeat_interval_ticks(20)
            .exchange("bybit")
            .build();

        assert_eq!(config.url, "wss://example.com/ws");
        assert_eq!(
            config.headers.get("User-Agent"),
            Some(&"Sirocco".to_string())
        );
        assert_eq!(config.heartbeat_interval_ticks, 20);
        assert_eq!(config.exchange, "bybit");
    }
}
