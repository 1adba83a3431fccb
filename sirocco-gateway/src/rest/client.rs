//! REST client with request signing and retries.

use reqwest::{header, Client, Method, Response};
use serde::de::DeserializeOwned;
use sirocco_core::NetworkError;
use tracing::{debug, warn};

use super::config::RestConfig;
use super::pool::HttpPool;
use super::signer::{build_query_string, RequestSigner};

/// REST client bound to one exchange endpoint.
///
/// The underlying HTTP connection comes from an [`HttpPool`], so
/// clients for the same host share connections.
///
/// # Example
///
/// ```ignore
/// let pool = HttpPool::new();
/// let config = RestConfig::builder()
///     .base_url("https://api.binance.com")
///     .exchange("binance")
///     .build();
/// let client = RestClient::new(config, &pool)?;
/// let price: serde_json::Value = client
///     .get("/api/v3/ticker/price")
///     .query("symbol", "BTCUSDT")
///     .send_json()
///     .await?;
/// ```
pub struct RestClient {
    config: RestConfig,
    http_client: Client,
    signer: Option<RequestSigner>,
}

impl RestClient {
    /// Creates a REST client backed by the pool.
    ///
    /// A signer is attached when the config carries an API secret.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the base URL is invalid or the HTTP
    /// client cannot be created.
    pub fn new(config: RestConfig, pool: &HttpPool) -> Result<Self, NetworkError> {
        let http_client = pool.client_for(&config.base_url)?;
        let signer = config
            .api_secret
            .as_ref()
            .map(|secret| RequestSigner::hmac_sha256(secret));

        Ok(Self {
            config,
            http_client,
            signer,
        })
    }

    /// Replaces the signer, for exchanges not using HMAC-SHA256.
    #[must_use]
    pub fn with_signer(mut self, signer: RequestSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Creates a GET request builder.
    #[must_use]
    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::GET, path)
    }

    /// Creates a POST request builder.
    #[must_use]
    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::POST, path)
    }

    /// Creates a PUT request builder.
    #[must_use]
    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::PUT, path)
    }

    /// Creates a DELETE request builder.
    #[must_use]
    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        RequestBuilder::new(self, Method::DELETE, path)
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Returns the signer if configured.
    #[must_use]
    pub fn signer(&self) -> Option<&RequestSigner> {
        self.signer.as_ref()
    }

    /// Builds the full URL for a path.
    #[must_use]
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
        }
    }

    async fn execute_request(
        &self,
        method: Method,
        url: &str,
        query: Option<&str>,
        body: Option<&str>,
        headers: &[(String, String)],
    ) -> Result<Response, NetworkError> {
        let full_url = if let Some(q) = query {
            format!("{url}?{q}")
        } else {
            url.to_string()
        };

        debug!(
            method = %method,
            url = %full_url,
            exchange = %self.config.exchange,
            "sending request"
        );

        let mut request = self
            .http_client
            .request(method, &full_url)
            .header(header::USER_AGENT, &self.config.user_agent);

        if let (Some(header_name), Some(api_key)) =
            (&self.config.api_key_header, &self.config.api_key)
        {
            request = request.header(header_name.as_str(), api_key.as_str());
        }

        for (key, value) in &self.config.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        if let Some(b) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(b.to_string());
        }

        request.send().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout {
                    timeout_ms: self.config.timeout_ms,
                }
            } else if e.is_connect() {
                NetworkError::ConnectionFailed {
                    reason: e.to_string(),
                }
            } else {
                NetworkError::Http {
                    status_code: e.status().map_or(0, |s| s.as_u16()),
                    reason: e.to_string(),
                }
            }
        })
    }
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base_url", &self.config.base_url)
            .field("exchange", &self.config.exchange)
            .finish()
    }
}

/// Request builder for REST API calls.
pub struct RequestBuilder<'a> {
    client: &'a RestClient,
    method: Method,
    path: String,
    query_params: Vec<(String, String)>,
    body: Option<String>,
    headers: Vec<(String, String)>,
    sign: bool,
}

impl<'a> RequestBuilder<'a> {
    fn new(client: &'a RestClient, method: Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_string(),
            query_params: Vec::new(),
            body: None,
            headers: Vec::new(),
            sign: false,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// Adds multiple query parameters.
    #[must_use]
    pub fn queries(mut self, params: &[(&str, &str)]) -> Self {
        for (key, value) in params {
            self.query_params
                .push(((*key).to_string(), (*value).to_string()));
        }
        self
    }

    /// Sets the request body as JSON.
    #[must_use]
    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Self {
        self.body = serde_json::to_string(body).ok();
        self
    }

    /// Sets the request body as a string.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Appends a signature over the query string.
    #[must_use]
    pub fn signed(mut self) -> Self {
        self.sign = true;
        self
    }

    /// Sends the request and returns the raw response.
    ///
    /// Recoverable failures and HTTP 429 responses are retried with
    /// exponential backoff up to the configured maximum.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the request ultimately fails.
    pub async fn send(self) -> Result<Response, NetworkError> {
        let url = self.client.build_url(&self.path);

        let query_string = if self.query_params.is_empty() {
            None
        } else {
            let params: Vec<(&str, &str)> = self
                .query_params
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            let query = build_query_string(&params);

            if self.sign {
                if let Some(signer) = self.client.signer() {
                    let signature = signer.sign(&query)?;
                    Some(format!("{query}&signature={signature}"))
                } else {
                    Some(query)
                }
            } else {
                Some(query)
            }
        };

        let mut attempt = 0u32;
        loop {
            let result = self
                .client
                .execute_request(
                    self.method.clone(),
                    &url,
                    query_string.as_deref(),
                    self.body.as_deref(),
                    &self.headers,
                )
                .await;

            match result {
                Ok(response) => {
                    if response.status().as_u16() == 429 && self.client.config.should_retry(attempt)
                    {
                        let delay = self.client.config.calculate_retry_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            "rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if e.is_recoverable() && self.client.config.should_retry(attempt) {
                        let delay = self.client.config.calculate_retry_delay(attempt);
                        warn!(
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "request failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Sends the request and deserializes the response as JSON.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the request fails, the status is not
    /// a success, or the body cannot be parsed.
    pub async fn send_json<T: DeserializeOwned>(self) -> Result<T, NetworkError> {
        let response = self.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Http {
                status_code: status.as_u16(),
                reason: body,
            });
        }

        response.json::<T>().await.map_err(|e| NetworkError::Http {
            status_code: status.as_u16(),
            reason: format!("Failed to parse response: {e}"),
        })
    }

    /// Sends the request and returns the response body as text.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the request fails or the status is
    /// not a success.
    pub async fn send_text(self) -> Result<String, NetworkError> {
        let response = self.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NetworkError::Http {
                status_code: status.as_u16(),
                reason: body,
            });
        }

        response.text().await.map_err(|e| NetworkError::Http {
            status_code: status.as_u16(),
            reason: format!("Failed to read response: {e}"),
        })
    }
}
