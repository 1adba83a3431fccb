//! Shared HTTP client pool.

use parking_lot::RwLock;
use reqwest::Client;
use sirocco_core::NetworkError;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Pool of `reqwest` clients keyed by host.
///
/// Connection reuse in `reqwest` happens inside a `Client`, so REST
/// clients for the same host must share one. The pool builds a client
/// per host on first use, with the pool-wide proxy and timeout applied.
pub struct HttpPool {
    proxy: Option<String>,
    timeout: Duration,
    clients: RwLock<HashMap<String, Client>>,
}

impl HttpPool {
    /// Creates a pool with no proxy and a 30 second request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(None, Duration::from_secs(30))
    }

    /// Creates a pool with an optional proxy and request timeout.
    #[must_use]
    pub fn with_options(proxy: Option<String>, timeout: Duration) -> Self {
        Self {
            proxy,
            timeout,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the client for the given URL's host, building it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL has no host, the proxy URL is
    /// invalid, or the client cannot be built.
    pub fn client_for(&self, url: &str) -> Result<Client, NetworkError> {
        let host = host_key(url)?;

        if let Some(client) = self.clients.read().get(&host) {
            return Ok(client.clone());
        }

        let mut builder = Client::builder().timeout(self.timeout);
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| NetworkError::Proxy {
                reason: format!("invalid proxy URL '{proxy}': {e}"),
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(|e| NetworkError::ConnectionFailed {
            reason: format!("Failed to create HTTP client: {e}"),
        })?;

        // a racing builder for the same host just wins; clients are
        // interchangeable
        self.clients.write().insert(host, client.clone());
        Ok(client)
    }

    /// Returns the number of pooled clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    /// Returns true if no clients have been built yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

impl Default for HttpPool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("proxy", &self.proxy)
            .field("timeout", &self.timeout)
            .field("clients", &self.len())
            .finish()
    }
}

fn host_key(url: &str) -> Result<String, NetworkError> {
    let parsed = Url::parse(url).map_err(|e| NetworkError::ConnectionFailed {
        reason: format!("invalid URL '{url}': {e}"),
    })?;
    parsed
        .host_str()
        .map(str::to_lowercase)
        .ok_or_else(|| NetworkError::ConnectionFailed {
            reason: format!("URL '{url}' has no host"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clients_shared_per_host() {
        let pool = HttpPool::new();

        pool.client_for("https://api.binance.com").unwrap();
        pool.client_for("https://api.binance.com/api/v3/time").unwrap();
        assert_eq!(pool.len(), 1);

        pool.client_for("https://api.bybit.com").unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_invalid_url() {
        let pool = HttpPool::new();
        assert!(pool.client_for("not a url").is_err());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_invalid_proxy() {
        let pool = HttpPool::with_options(
            Some("::bad::".to_string()),
            Duration::from_secs(5),
        );
        let err = pool.client_for("https://api.binance.com").unwrap_err();
        assert!(matches!(err, NetworkError::Proxy { .. }));
    }
}
