//! Request signing utilities.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use sirocco_core::NetworkError;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;

/// Signature algorithm for exchange authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureType {
    /// HMAC-SHA256 with hex encoding (Binance, Bybit).
    HmacSha256,
    /// HMAC-SHA256 with base64 encoding.
    HmacSha256Base64,
    /// HMAC-SHA512 with hex encoding (Gate.io).
    HmacSha512,
}

/// Request signer for exchange API authentication.
#[derive(Clone)]
pub struct RequestSigner {
    secret: String,
    signature_type: SignatureType,
}

impl RequestSigner {
    /// Creates a new request signer.
    #[must_use]
    pub fn new(secret: impl Into<String>, signature_type: SignatureType) -> Self {
        Self {
            secret: secret.into(),
            signature_type,
        }
    }

    /// Creates a signer for HMAC-SHA256 (hex output).
    #[must_use]
    pub fn hmac_sha256(secret: impl Into<String>) -> Self {
        Self::new(secret, SignatureType::HmacSha256)
    }

    /// Creates a signer for HMAC-SHA256 (base64 output).
    #[must_use]
    pub fn hmac_sha256_base64(secret: impl Into<String>) -> Self {
        Self::new(secret, SignatureType::HmacSha256Base64)
    }

    /// Creates a signer for HMAC-SHA512 (hex output).
    #[must_use]
    pub fn hmac_sha512(secret: impl Into<String>) -> Self {
        Self::new(secret, SignatureType::HmacSha512)
    }

    /// Signs a message with the configured algorithm.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the HMAC cannot be constructed.
    pub fn sign(&self, message: &str) -> Result<String, NetworkError> {
        match self.signature_type {
            SignatureType::HmacSha256 => self.sign_hmac_sha256_hex(message),
            SignatureType::HmacSha256Base64 => self.sign_hmac_sha256_base64(message),
            SignatureType::HmacSha512 => self.sign_hmac_sha512_hex(message),
        }
    }

    /// Signs a message using HMAC-SHA256, hex encoded.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the HMAC cannot be constructed.
    pub fn sign_hmac_sha256_hex(&self, message: &str) -> Result<String, NetworkError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|e| {
            NetworkError::ConnectionFailed {
                reason: format!("Failed to create HMAC: {e}"),
            }
        })?;

        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Signs a message using HMAC-SHA256, base64 encoded.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the HMAC cannot be constructed.
    pub fn sign_hmac_sha256_base64(&self, message: &str) -> Result<String, NetworkError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).map_err(|e| {
            NetworkError::ConnectionFailed {
                reason: format!("Failed to create HMAC: {e}"),
            }
        })?;

        mac.update(message.as_bytes());
        Ok(base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            mac.finalize().into_bytes(),
        ))
    }

    /// Signs a message using HMAC-SHA512, hex encoded.
    ///
    /// # Errors
    ///
    /// Returns `NetworkError` if the HMAC cannot be constructed.
    pub fn sign_hmac_sha512_hex(&self, message: &str) -> Result<String, NetworkError> {
        let mut mac = HmacSha512::new_from_slice(self.secret.as_bytes()).map_err(|e| {
            NetworkError::ConnectionFailed {
                reason: format!("Failed to create HMAC: {e}"),
            }
        })?;

        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Returns the signature type.
    #[must_use]
    pub fn signature_type(&self) -> SignatureType {
        self.signature_type
    }
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("signature_type", &self.signature_type)
            .finish()
    }
}

/// Builds a query string from parameters.
///
/// Insertion order is preserved: Binance validates the signature over
/// the exact parameter order, with `timestamp` last.
#[must_use]
pub fn build_query_string(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

/// Builds a query string with the signature appended.
///
/// # Errors
///
/// Returns `NetworkError` if signing fails.
pub fn build_signed_query_string(
    params: &[(&str, &str)],
    signer: &RequestSigner,
) -> Result<String, NetworkError> {
    let query = build_query_string(params);
    let signature = signer.sign(&query)?;
    Ok(format!("{query}&signature={signature}"))
}
