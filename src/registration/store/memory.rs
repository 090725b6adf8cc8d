use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RegistrationStore, SignupOutcome};
use crate::registration::keys::ACTIVATED;
use crate::registration::models::{NewUser, RegistrationProfile, User};

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    profiles: HashMap<Uuid, RegistrationProfile>,
}

/// Process-local store for development and tests. Data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    pub async fn profile_count(&self) -> usize {
        self.tables.read().await.profiles.len()
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn create_user(
        &self,
        new_user: NewUser,
        activation_key: Option<&str>,
        unique_email: bool,
    ) -> Result<SignupOutcome> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|user| user.username == new_user.username)
        {
            return Ok(SignupOutcome::UsernameTaken);
        }

        if unique_email
            && tables
                .users
                .values()
                .any(|user| user.email.eq_ignore_ascii_case(&new_user.email))
        {
            return Ok(SignupOutcome::EmailTaken);
        }

        if let Some(key) = activation_key
            && tables
                .profiles
                .values()
                .any(|profile| profile.activation_key == key)
        {
            return Err(anyhow!("activation key collision"));
        }

        let user = new_user.into_user();
        if let Some(key) = activation_key {
            let profile = RegistrationProfile {
                id: Uuid::new_v4(),
                user_id: user.id,
                activation_key: key.to_string(),
            };
            tables.profiles.insert(profile.id, profile);
        }
        tables.users.insert(user.id, user.clone());

        Ok(SignupOutcome::Created(user))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().any(|user| user.username == username))
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .any(|user| user.email.eq_ignore_ascii_case(email)))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_inactive_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables
            .users
            .values()
            .filter(|user| !user.is_active && user.email.eq_ignore_ascii_case(email))
            .cloned()
            .collect();
        users.sort_by_key(|user| user.date_joined);
        Ok(users)
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<RegistrationProfile>> {
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .find(|profile| profile.user_id == user_id)
            .cloned())
    }

    async fn find_profile_by_key(
        &self,
        activation_key: &str,
    ) -> Result<Option<(RegistrationProfile, User)>> {
        let tables = self.tables.read().await;
        let found = tables
            .profiles
            .values()
            .find(|profile| profile.activation_key == activation_key)
            .and_then(|profile| {
                tables
                    .users
                    .get(&profile.user_id)
                    .map(|user| (profile.clone(), user.clone()))
            });
        Ok(found)
    }

    async fn consume_activation_key(
        &self,
        profile_id: Uuid,
        activation_key: &str,
    ) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;

        let Some(profile) = tables.profiles.get_mut(&profile_id) else {
            return Ok(None);
        };
        if profile.activation_key != activation_key {
            return Ok(None);
        }
        profile.activation_key = ACTIVATED.to_string();
        let user_id = profile.user_id;

        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("profile {profile_id} references missing user {user_id}"))?;
        user.is_active = true;
        Ok(Some(user.clone()))
    }

    async fn activate_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let mut tables = self.tables.write().await;
        match tables.users.get_mut(&user_id) {
            Some(user) if !user.is_active => {
                user.is_active = true;
                Ok(Some(user.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_expired_users(&self, joined_before: DateTime<Utc>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let Tables { users, profiles } = &mut *tables;

        let expired: Vec<Uuid> = users
            .values()
            .filter(|user| !user.is_active && user.date_joined <= joined_before)
            .filter(|user| {
                !profiles.values().any(|profile| {
                    profile.user_id == user.id && profile.activation_key == ACTIVATED
                })
            })
            .map(|user| user.id)
            .collect();

        for user_id in &expired {
            users.remove(user_id);
        }
        profiles.retain(|_, profile| !expired.contains(&profile.user_id));

        Ok(u64::try_from(expired.len()).unwrap_or(u64::MAX))
    }
}
