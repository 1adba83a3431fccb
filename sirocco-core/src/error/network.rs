//! Network-related error types.
//!
//! Covers TCP/TLS connection failures, timeouts, proxy tunneling,
//! WebSocket and HTTP errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Network error type covering connection failures, timeouts, proxy,
/// TLS, WebSocket and HTTP errors.
///
/// # Examples
///
/// ```
/// use sirocco_core::error::NetworkError;
///
/// let error = NetworkError::ConnectionFailed {
///     reason: "Connection refused".to_string(),
/// };
/// assert!(error.to_string().contains("Connection refused"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkError {
    /// Connection to remote host failed.
    #[error("[Network] Connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for the connection failure.
        reason: String,
    },

    /// Connection timed out.
    #[error("[Network] Connection timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Proxy tunnel could not be established.
    #[error("[Network] Proxy error: {reason}")]
    Proxy {
        /// Reason for the proxy failure.
        reason: String,
    },

    /// TLS/SSL error occurred.
    #[error("[Network] TLS error: {reason}")]
    Tls {
        /// Reason for the TLS error.
        reason: String,
    },

    /// WebSocket error occurred.
    #[error("[Network] WebSocket error: {reason}")]
    WebSocket {
        /// Reason for the WebSocket error.
        reason: String,
    },

    /// HTTP request failed.
    #[error("[Network] HTTP error: status {status_code} - {reason}")]
    Http {
        /// HTTP status code.
        status_code: u16,
        /// Reason for the HTTP error.
        reason: String,
    },

    /// Connection was closed unexpectedly.
    #[error("[Network] Connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for the connection closure.
        reason: String,
    },
}

impl NetworkError {
    /// Returns true if this error is recoverable (can be retried).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::ConnectionFailed { .. }
                | Self::ConnectionClosed { .. }
                | Self::WebSocket { .. }
        )
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::Proxy { .. } | Self::Tls { .. } => ErrorSeverity::Fatal,
            Self::Timeout { .. }
            | Self::ConnectionFailed { .. }
            | Self::ConnectionClosed { .. }
            | Self::WebSocket { .. } => ErrorSeverity::Recoverable,
            Self::Http { status_code, .. } if *status_code >= 500 => ErrorSeverity::Recoverable,
            Self::Http { .. } => ErrorSeverity::Warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed() {
        let error = NetworkError::ConnectionFailed {
            reason: "Connection refused".to_string(),
        };
        assert!(error.to_string().contains("Connection refused"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_timeout() {
        let error = NetworkError::Timeout { timeout_ms: 5000 };
        assert!(error.to_string().contains("5000ms"));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_proxy_error() {
        let error = NetworkError::Proxy {
            reason: "CONNECT rejected: 403".to_string(),
        };
        assert!(error.to_string().contains("403"));
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_http_severity() {
        let server = NetworkError::Http {
            status_code: 503,
            reason: "unavailable".to_string(),
        };
        assert!(server.severity().is_recoverable());

        let client = NetworkError::Http {
            status_code: 404,
            reason: "not found".to_string(),
        };
        assert_eq!(client.severity(), crate::error::ErrorSeverity::Warning);
        assert!(!client.is_recoverable());
    }

    #[test]
    fn test_serde_roundtrip() {
        let error = NetworkError::Timeout { timeout_ms: 3000 };
        let json = serde_json::to_string(&error).unwrap();
        let parsed: NetworkError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, parsed);
    }
}
