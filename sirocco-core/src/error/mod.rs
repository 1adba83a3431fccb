//! Error types and handling framework.
//!
//! The error system is organized hierarchically:
//! - `SiroccoError` - Top-level error type
//!   - `NetworkError` - Network, WebSocket and HTTP errors
//!   - `ExchangeError` - Exchange API errors
//!   - `ConfigError` - Configuration errors

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error severity levels for categorizing errors.
///
/// Severity levels help determine the appropriate response to an error:
/// - `Fatal`: Unrecoverable errors that require immediate attention
/// - `Recoverable`: Errors that can be retried or recovered from
/// - `Warning`: Non-critical issues that should be logged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error requiring immediate attention.
    Fatal,

    /// Error that can potentially be recovered from through retry.
    #[default]
    Recoverable,

    /// Non-critical issue that should be logged but doesn't prevent operation.
    Warning,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal (unrecoverable).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod config;
mod exchange;
mod network;

pub use config::ConfigError;
pub use exchange::ExchangeError;
pub use network::NetworkError;

/// Top-level error type for the Sirocco connectivity stack.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SiroccoError {
    /// Network-related error.
    #[error("{0}")]
    Network(#[from] NetworkError),

    /// Exchange API error.
    #[error("{0}")]
    Exchange(#[from] ExchangeError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl SiroccoError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Network(e) => e.severity(),
            Self::Exchange(e) => e.severity(),
            Self::Config(e) => e.severity(),
        }
    }

    /// Returns true if this error is recoverable.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity().is_recoverable()
    }

    /// Returns the error category as a string.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Exchange(_) => "exchange",
            Self::Config(_) => "config",
        }
    }

    /// Returns the inner network error, if this is a network error.
    #[must_use]
    pub fn as_network_error(&self) -> Option<&NetworkError> {
        match self {
            Self::Network(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the inner exchange error, if this is an exchange error.
    #[must_use]
    pub fn as_exchange_error(&self) -> Option<&ExchangeError> {
        match self {
            Self::Exchange(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the inner config error, if this is a config error.
    #[must_use]
    pub fn as_config_error(&self) -> Option<&ConfigError> {
        match self {
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

/// A specialized Result type for Sirocco operations.
pub type Result<T> = std::result::Result<T, SiroccoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Fatal.to_string(), "FATAL");
        assert_eq!(ErrorSeverity::Recoverable.to_string(), "RECOVERABLE");
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARNING");
    }

    #[test]
    fn test_error_severity_is_recoverable() {
        assert!(!ErrorSeverity::Fatal.is_recoverable());
        assert!(ErrorSeverity::Recoverable.is_recoverable());
        assert!(ErrorSeverity::Warning.is_recoverable());
    }

    #[test]
    fn test_network_error_conversion() {
        let network_err = NetworkError::Timeout { timeout_ms: 5000 };
        let err: SiroccoError = network_err.clone().into();
        assert_eq!(err.category(), "network");
        assert_eq!(err.as_network_error(), Some(&network_err));
        assert!(err.as_config_error().is_none());
    }

    #[test]
    fn test_config_error_conversion() {
        let config_err = ConfigError::missing_field("api_key");
        let err: SiroccoError = config_err.clone().into();
        assert_eq!(err.category(), "config");
        assert_eq!(err.as_config_error(), Some(&config_err));
    }

    #[test]
    fn test_exchange_error_conversion() {
        let exchange_err = ExchangeError::MissingCredentials {
            exchange: "bybit".to_string(),
        };
        let err: SiroccoError = exchange_err.clone().into();
        assert_eq!(err.category(), "exchange");
        assert_eq!(err.as_exchange_error(), Some(&exchange_err));
    }

    #[test]
    fn test_is_recoverable_delegates() {
        let recoverable = SiroccoError::Network(NetworkError::Timeout { timeout_ms: 5000 });
        assert!(recoverable.is_recoverable());

        let fatal = SiroccoError::Network(NetworkError::Tls {
            reason: "handshake failed".to_string(),
        });
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = SiroccoError::Network(NetworkError::Timeout { timeout_ms: 5000 });
        assert!(format!("{err}").contains("5000ms"));
    }
}
