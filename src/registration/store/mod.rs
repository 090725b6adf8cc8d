//! Persistence for users and registration profiles.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::models::{NewUser, RegistrationProfile, User};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Outcome when attempting to create a new user (+ profile).
#[derive(Debug)]
pub enum SignupOutcome {
    Created(User),
    UsernameTaken,
    /// Only reported when the caller asked for unique emails.
    EmailTaken,
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Insert the user and, when `activation_key` is set, its profile in one unit.
    ///
    /// With `unique_email` the email check happens in the same unit, so two
    /// concurrent signups cannot share an address.
    async fn create_user(
        &self,
        new_user: NewUser,
        activation_key: Option<&str>,
        unique_email: bool,
    ) -> Result<SignupOutcome>;

    async fn username_exists(&self, username: &str) -> Result<bool>;

    async fn email_exists(&self, email: &str) -> Result<bool>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn find_inactive_users_by_email(&self, email: &str) -> Result<Vec<User>>;

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<RegistrationProfile>>;

    async fn find_profile_by_key(
        &self,
        activation_key: &str,
    ) -> Result<Option<(RegistrationProfile, User)>>;

    /// Replace `activation_key` with the consumed sentinel and activate the user.
    ///
    /// Returns `None` when the profile no longer holds `activation_key`, so only one
    /// caller can win for a given key.
    async fn consume_activation_key(
        &self,
        profile_id: Uuid,
        activation_key: &str,
    ) -> Result<Option<User>>;

    /// Activate a user that is currently inactive; `None` if it is missing or active.
    async fn activate_user(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Delete inactive users that joined at or before `joined_before`, keeping those
    /// whose activation key was consumed (deactivated after activation).
    async fn delete_expired_users(&self, joined_before: DateTime<Utc>) -> Result<u64>;
}
