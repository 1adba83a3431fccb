//! REST client configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// REST client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Base URL, e.g. `https://api.binance.com`.
    pub base_url: String,

    /// API key sent in the `api_key_header` header.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API secret used for request signing. Not serialized.
    #[serde(skip)]
    pub api_secret: Option<String>,

    /// Header name the API key is sent in, e.g. `X-MBX-APIKEY`.
    #[serde(default)]
    pub api_key_header: Option<String>,

    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum retries for recoverable failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base retry delay in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Retry delay ceiling in milliseconds.
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,

    /// Exchange name used in log lines.
    #[serde(default)]
    pub exchange: String,

    /// Extra headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1_000
}

fn default_max_retry_delay_ms() -> u64 {
    30_000
}

fn default_user_agent() -> String {
    format!("Sirocco/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            api_secret: None,
            api_key_header: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
            exchange: String::new(),
            headers: HashMap::new(),
            user_agent: default_user_agent(),
        }
    }
}

impl RestConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> RestConfigBuilder {
        RestConfigBuilder::default()
    }

    /// Returns the request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the delay before the given 0-based retry attempt.
    ///
    /// The delay doubles per attempt and is capped at
    /// `max_retry_delay_ms`.
    #[must_use]
    pub fn calculate_retry_delay(&self, attempt: u32) -> Duration {
        let multiplier = 2u64.saturating_pow(attempt);
        let delay_ms = self
            .retry_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_retry_delay_ms);
        Duration::from_millis(delay_ms)
    }

    /// Returns true if another retry is allowed.
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

/// Builder for [`RestConfig`].
#[derive(Debug, Clone, Default)]
pub struct RestConfigBuilder {
    config: RestConfig,
}

impl RestConfigBuilder {
    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    /// Sets the API secret.
    #[must_use]
    pub fn api_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.api_secret = Some(secret.into());
        self
    }

    /// Sets the header name the API key is sent in.
    #[must_use]
    pub fn api_key_header(mut self, name: impl Into<String>) -> Self {
        self.config.api_key_header = Some(name.into());
        self
    }

    /// Sets the request timeout in milliseconds.
    #[must_use]
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    /// Sets the maximum retries.
    #[must_use]
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Sets the base retry delay in milliseconds.
    #[must_use]
    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    /// Sets the exchange name used in log lines.
    #[must_use]
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.config.exchange = exchange.into();
        self
    }

    /// Adds an extra request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> RestConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RestConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.max_retries, 3);
        assert!(config.user_agent.starts_with("Sirocco/"));
    }

    #[test]
    fn test_exponential_retry_delay() {
        let config = RestConfig::default();
        assert_eq!(config.calculate_retry_delay(0), Duration::from_secs(1));
        assert_eq!(config.calculate_retry_delay(1), Duration::from_secs(2));
        assert_eq!(config.calculate_retry_delay(2), Duration::from_secs(4));
        // capped
        assert_eq!(config.calculate_retry_delay(10), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry() {
        let config = RestConfig::builder().max_retries(2).build();
        assert!(config.should_retry(0));
        assert!(config.should_retry(1));
        assert!(!config.should_retry(2));
    }

    #[test]
    fn test_secret_not_serialized() {
        let config = RestConfig::builder()
            .api_key("key")
            .api_secret("very-secret")
            .build();

        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("very-secret"));
    }
}
