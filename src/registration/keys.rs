//! Activation-key issuance and expiry checks for the model workflow.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};

/// Stored in place of a consumed activation key.
pub const ACTIVATED: &str = "ALREADY_ACTIVATED";

/// Length of an issued key (hex encoded SHA-256).
pub const KEY_LEN: usize = 64;

const SALT_LEN: usize = 16;

/// Issue a new activation key for `username`.
///
/// The key is `sha256(salt || username)` hex encoded, with a random salt per call.
pub fn generate_activation_key(username: &str) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate activation key salt")?;
    Ok(derive_activation_key(&hex::encode(salt), username))
}

fn derive_activation_key(salt: &str, username: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(username.as_bytes());
    hex::encode(hasher.finalize())
}

/// Cheap shape check so obviously bogus keys never reach storage.
#[must_use]
pub fn is_well_formed(key: &str) -> bool {
    key.len() == KEY_LEN
        && key
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Convert the configured window in days to a duration.
#[must_use]
pub fn activation_window(days: u32) -> Duration {
    Duration::days(i64::from(days))
}

/// True once the window has elapsed since `date_joined`.
#[must_use]
pub fn window_elapsed(date_joined: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    date_joined
        .checked_add_signed(window)
        .is_none_or(|deadline| deadline <= now)
}

/// A stored key is expired when it was already consumed or its window elapsed.
#[must_use]
pub fn activation_key_expired(
    activation_key: &str,
    date_joined: DateTime<Utc>,
    window: Duration,
    now: DateTime<Utc>,
) -> bool {
    activation_key == ACTIVATED || window_elapsed(date_joined, window, now)
}
