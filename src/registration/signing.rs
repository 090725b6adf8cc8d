//! Timestamped HMAC-SHA256 signatures used as activation keys by the hmac workflow.
//!
//! A signed value looks like `<payload>:<timestamp>:<signature>`, where `payload` is the
//! base64url encoded value, `timestamp` the issue time in unix seconds and `signature`
//! the base64url encoded MAC over `salt:payload:timestamp`.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;

use super::keys::window_elapsed;

type HmacSha256 = Hmac<Sha256>;

/// Namespaces activation signatures so tokens signed elsewhere with the same key are rejected.
pub const REGISTRATION_SALT: &str = "registration";

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SigningError {
    #[error("malformed signed value")]
    Malformed,
    #[error("signature does not match")]
    BadSignature,
    #[error("signature expired")]
    Expired,
    #[error("invalid signing key")]
    InvalidKey,
}

#[derive(Clone)]
pub struct Signer {
    secret: SecretString,
    salt: String,
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("salt", &self.salt)
            .finish_non_exhaustive()
    }
}

impl Signer {
    #[must_use]
    pub fn new(secret: SecretString, salt: &str) -> Self {
        Self {
            secret,
            salt: salt.to_string(),
        }
    }

    /// Sign `value` as issued at `now`.
    ///
    /// # Errors
    /// Returns `SigningError::InvalidKey` if the MAC cannot be keyed.
    pub fn sign(&self, value: &str, now: DateTime<Utc>) -> Result<String, SigningError> {
        let payload = URL_SAFE_NO_PAD.encode(value.as_bytes());
        let timestamp = now.timestamp().to_string();
        let mac = self.mac(&payload, &timestamp)?;
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}:{timestamp}:{signature}"))
    }

    /// Verify `token` and return the original value.
    ///
    /// # Errors
    /// `Malformed` when the token cannot be parsed, `BadSignature` when the MAC does not
    /// verify, `Expired` when `max_age` has elapsed since the token was issued.
    pub fn unsign(
        &self,
        token: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<String, SigningError> {
        let mut parts = token.splitn(3, ':');
        let (Some(payload), Some(timestamp), Some(signature)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(SigningError::Malformed);
        };

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| SigningError::Malformed)?;

        // Verify before interpreting anything else in the token.
        self.mac(payload, timestamp)?
            .verify_slice(&signature)
            .map_err(|_| SigningError::BadSignature)?;

        let issued_at = timestamp
            .parse::<i64>()
            .ok()
            .and_then(|seconds| DateTime::<Utc>::from_timestamp(seconds, 0))
            .ok_or(SigningError::Malformed)?;

        if window_elapsed(issued_at, max_age, now) {
            return Err(SigningError::Expired);
        }

        let value = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| SigningError::Malformed)?;
        String::from_utf8(value).map_err(|_| SigningError::Malformed)
    }

    fn mac(&self, payload: &str, timestamp: &str) -> Result<HmacSha256, SigningError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| SigningError::InvalidKey)?;
        mac.update(self.salt.as_bytes());
        mac.update(b":");
        mac.update(payload.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        Ok(mac)
    }
}
