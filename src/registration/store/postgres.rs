//! Postgres-backed store. Schema: `db/sql/registration.sql`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::{Instrument, info_span};
use uuid::Uuid;

use super::{RegistrationStore, SignupOutcome};
use crate::registration::keys::ACTIVATED;
use crate::registration::models::{NewUser, RegistrationProfile, User};

const USER_COLUMNS: &str = "id, username, email, password_hash, is_active, date_joined";
const EMAIL_EXISTS: &str =
    "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1)) AS exists";
// Held until commit, so signups for the same address run one at a time.
const LOCK_EMAIL: &str = "SELECT pg_advisory_xact_lock(hashtext(lower($1)))";

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        date_joined: row.get("date_joined"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn create_user(
        &self,
        new_user: NewUser,
        activation_key: Option<&str>,
        unique_email: bool,
    ) -> Result<SignupOutcome> {
        // User and profile are created together or not at all.
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin signup transaction")?;

        if unique_email {
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = LOCK_EMAIL
            );
            sqlx::query(LOCK_EMAIL)
                .bind(&new_user.email)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to lock email")?;

            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "SELECT",
                db.statement = EMAIL_EXISTS
            );
            let row = sqlx::query(EMAIL_EXISTS)
                .bind(&new_user.email)
                .fetch_one(&mut *tx)
                .instrument(span)
                .await
                .context("failed to check email")?;
            if row.get::<bool, _>("exists") {
                let _ = tx.rollback().await;
                return Ok(SignupOutcome::EmailTaken);
            }
        }

        let user = new_user.into_user();
        let query = r"
            INSERT INTO users
                (id, username, email, password_hash, is_active, date_joined)
            VALUES ($1, $2, $3, $4, $5, $6)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        let inserted = sqlx::query(query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.is_active)
            .bind(user.date_joined)
            .execute(&mut *tx)
            .instrument(span)
            .await;

        if let Err(err) = inserted {
            if is_unique_violation(&err) {
                let _ = tx.rollback().await;
                return Ok(SignupOutcome::UsernameTaken);
            }
            return Err(err).context("failed to insert user");
        }

        if let Some(key) = activation_key {
            let query = r"
                INSERT INTO registration_profiles (id, user_id, activation_key)
                VALUES ($1, $2, $3)
            ";
            let span = info_span!(
                "db.query",
                db.system = "postgresql",
                db.operation = "INSERT",
                db.statement = query
            );
            sqlx::query(query)
                .bind(Uuid::new_v4())
                .bind(user.id)
                .bind(key)
                .execute(&mut *tx)
                .instrument(span)
                .await
                .context("failed to insert registration profile")?;
        }

        tx.commit().await.context("commit signup transaction")?;

        Ok(SignupOutcome::Created(user))
    }

    async fn username_exists(&self, username: &str) -> Result<bool> {
        let query = "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1) AS exists";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(username)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to check username")?;
        Ok(row.get("exists"))
    }

    async fn email_exists(&self, email: &str) -> Result<bool> {
        let query = EMAIL_EXISTS;
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(email)
            .fetch_one(&self.pool)
            .instrument(span)
            .await
            .context("failed to check email")?;
        Ok(row.get("exists"))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup user by username")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_inactive_users_by_email(&self, email: &str) -> Result<Vec<User>> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(email) = lower($1) AND is_active = FALSE \
             ORDER BY date_joined ASC"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .bind(email)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup inactive users by email")?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn find_profile_by_user(&self, user_id: Uuid) -> Result<Option<RegistrationProfile>> {
        let query = "SELECT id, user_id, activation_key FROM registration_profiles WHERE user_id = $1";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup registration profile")?;
        Ok(row.map(|row| RegistrationProfile {
            id: row.get("id"),
            user_id: row.get("user_id"),
            activation_key: row.get("activation_key"),
        }))
    }

    async fn find_profile_by_key(
        &self,
        activation_key: &str,
    ) -> Result<Option<(RegistrationProfile, User)>> {
        let query = r"
            SELECT registration_profiles.id AS profile_id,
                   registration_profiles.activation_key,
                   users.id, users.username, users.email, users.password_hash,
                   users.is_active, users.date_joined
            FROM registration_profiles
            JOIN users ON users.id = registration_profiles.user_id
            WHERE registration_profiles.activation_key = $1
            LIMIT 1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(activation_key)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to lookup activation key")?;

        Ok(row.map(|row| {
            let user = user_from_row(&row);
            let profile = RegistrationProfile {
                id: row.get("profile_id"),
                user_id: user.id,
                activation_key: row.get("activation_key"),
            };
            (profile, user)
        }))
    }

    async fn consume_activation_key(
        &self,
        profile_id: Uuid,
        activation_key: &str,
    ) -> Result<Option<User>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("begin activation transaction")?;

        // Conditional on the key so concurrent activations cannot both succeed.
        let query = r"
            UPDATE registration_profiles
            SET activation_key = $3
            WHERE id = $1
              AND activation_key = $2
            RETURNING user_id
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(profile_id)
            .bind(activation_key)
            .bind(ACTIVATED)
            .fetch_optional(&mut *tx)
            .instrument(span)
            .await
            .context("failed to consume activation key")?;

        let Some(row) = row else {
            let _ = tx.rollback().await;
            return Ok(None);
        };
        let user_id: Uuid = row.get("user_id");

        let query = format!(
            "UPDATE users SET is_active = TRUE WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_one(&mut *tx)
            .instrument(span)
            .await
            .context("failed to activate user")?;

        tx.commit().await.context("commit activation transaction")?;

        Ok(Some(user_from_row(&row)))
    }

    async fn activate_user(&self, user_id: Uuid) -> Result<Option<User>> {
        let query = format!(
            "UPDATE users SET is_active = TRUE \
             WHERE id = $1 AND is_active = FALSE \
             RETURNING {USER_COLUMNS}"
        );
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .context("failed to activate user")?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn delete_expired_users(&self, joined_before: DateTime<Utc>) -> Result<u64> {
        let query = r"
            DELETE FROM users
            WHERE is_active = FALSE
              AND date_joined <= $1
              AND NOT EXISTS (
                  SELECT 1
                  FROM registration_profiles
                  WHERE registration_profiles.user_id = users.id
                    AND registration_profiles.activation_key = $2
              )
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(joined_before)
            .bind(ACTIVATED)
            .execute(&self.pool)
            .instrument(span)
            .await
            .context("failed to delete expired users")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn is_unique_violation_matches_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("99999"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::RowNotFound;
        assert!(!is_unique_violation(&err));
    }

    // Normalize SQL to avoid brittle formatting checks in schema tests.
    fn canonical_schema() -> Result<String> {
        let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("db/sql/registration.sql");
        let sql = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read SQL file at {}", path.display()))?;
        Ok(sql
            .chars()
            .filter(|ch| !ch.is_whitespace())
            .map(|ch| ch.to_ascii_lowercase())
            .collect())
    }

    #[test]
    fn schema_matches_queries() -> Result<()> {
        let canonical = canonical_schema()?;
        for column in USER_COLUMNS.split(',').map(str::trim) {
            anyhow::ensure!(canonical.contains(column), "users.{column} missing");
        }
        anyhow::ensure!(canonical.contains("uniqueindexifnotexistsusers_username_key"));
        anyhow::ensure!(canonical.contains("referencesusers(id)ondeletecascade"));
        let sentinel = format!("whereactivation_key<>'{}'", ACTIVATED.to_ascii_lowercase());
        anyhow::ensure!(
            canonical.contains(&sentinel),
            "activation key index must skip the consumed sentinel"
        );
        Ok(())
    }

    #[test]
    fn email_lock_and_lookup_share_the_indexed_key() -> Result<()> {
        let canonical = canonical_schema()?;
        anyhow::ensure!(canonical.contains("onusers(lower(email))"));
        anyhow::ensure!(EMAIL_EXISTS.contains("lower(email) = lower($1)"));
        anyhow::ensure!(LOCK_EMAIL.contains("pg_advisory_xact_lock(hashtext(lower($1)))"));
        Ok(())
    }

    #[tokio::test]
    async fn pg_store_builds_from_lazy_pool() -> Result<()> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/registrar")?;
        let store = PgStore::new(pool);
        assert!(format!("{store:?}").contains("PgStore"));
        Ok(())
    }
}
