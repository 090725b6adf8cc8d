use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A registered account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

/// Activation state for a user registered through the model workflow.
///
/// There is exactly one profile per user. Once the account is activated the key is
/// replaced with [`ACTIVATED`](crate::registration::keys::ACTIVATED).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistrationProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub activation_key: String,
}

/// Validated registration data ready to be persisted.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl NewUser {
    /// Materialize the user with a fresh id.
    #[must_use]
    pub fn into_user(self) -> User {
        User {
            id: Uuid::new_v4(),
            username: self.username,
            email: self.email,
            password_hash: self.password_hash,
            is_active: self.is_active,
            date_joined: self.date_joined,
        }
    }
}
