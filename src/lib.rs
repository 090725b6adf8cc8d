//! # Registrar (User Registration & Account Activation)
//!
//! `registrar` registers user accounts and activates them through emailed
//! activation links.
//!
//! ## Workflows
//!
//! - **model** (alias `default`): registration stores a profile holding a random
//!   activation key derived from the username and a salt. Following the emailed link
//!   activates the account and replaces the key with a sentinel so it cannot be reused.
//! - **hmac**: no profile is stored. The emailed key is the username signed with
//!   HMAC-SHA256 together with the time it was issued.
//! - **simple**: accounts are active as soon as they are registered.
//!
//! ## Activation Window
//!
//! Keys expire `activation_days` after the account was created. Expired, unknown and
//! already consumed keys all render the activation failure page; only a valid key
//! redirects to the completion page.
//!
//! ## Signals
//!
//! Listeners connect to `user_registered` and `user_activated` on the registrar's
//! [`registration::Signals`] and receive the user together with the originating
//! request context. Each successful activation notifies listeners exactly once.

pub mod api;
pub mod cli;
pub mod registration;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
