//! Exchange-related error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Exchange error type covering authentication failures, missing
/// credentials and exchange-reported errors.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExchangeError {
    /// Authentication with the exchange failed.
    #[error("[Exchange] Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Reason for the authentication failure.
        reason: String,
    },

    /// Credentials required for a private channel are not configured.
    #[error("[Exchange] Missing credentials for {exchange}")]
    MissingCredentials {
        /// Exchange name the credentials were looked up for.
        exchange: String,
    },

    /// Subscription was rejected by the exchange.
    #[error("[Exchange] Subscription rejected for '{channel}': {reason}")]
    SubscriptionRejected {
        /// Channel or topic that was rejected.
        channel: String,
        /// Reason returned by the exchange.
        reason: String,
    },

    /// Exchange returned an unknown error.
    #[error("[Exchange] Unknown error: code={code}, message={message}")]
    Unknown {
        /// Error code from the exchange.
        code: i64,
        /// Error message from the exchange.
        message: String,
    },
}

impl ExchangeError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> super::ErrorSeverity {
        use super::ErrorSeverity;
        match self {
            Self::AuthenticationFailed { .. } | Self::MissingCredentials { .. } => {
                ErrorSeverity::Fatal
            }
            Self::SubscriptionRejected { .. } | Self::Unknown { .. } => ErrorSeverity::Warning,
        }
    }
}
