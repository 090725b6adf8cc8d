use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::config::RegistrationConfig;
use super::email::{EmailSender, LogEmailSender, activation_email};
use super::error::{ActivationError, RegistrationError};
use super::forms::{
    FormErrors, MSG_EMAIL_TAKEN, MSG_USERNAME_TAKEN, RegistrationForm, normalize_email,
    valid_email,
};
use super::keys::{self, ACTIVATED};
use super::models::{NewUser, User};
use super::password::hash_password_blocking;
use super::signals::{RequestContext, Signals, UserActivated, UserRegistered};
use super::signing::{REGISTRATION_SALT, Signer, SigningError};
use super::store::{RegistrationStore, SignupOutcome};
use super::workflow::Workflow;

/// Result of a successful registration.
#[derive(Clone, Debug)]
pub struct Registered {
    pub user: User,
    /// False when no email was needed or delivery failed.
    pub email_sent: bool,
}

/// Outcome for a resend request; callers should not reveal which one happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResendOutcome {
    Sent(usize),
    Noop,
}

/// Runs the configured registration workflow.
pub struct Registrar {
    config: RegistrationConfig,
    store: Arc<dyn RegistrationStore>,
    email_sender: Arc<dyn EmailSender>,
    clock: Arc<dyn Clock>,
    signals: Signals,
    signer: Option<Signer>,
}

impl std::fmt::Debug for Registrar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registrar")
            .field("workflow", &self.config.workflow())
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

impl Registrar {
    /// Build a registrar that logs emails and uses the system clock.
    ///
    /// # Errors
    /// Returns an error if the hmac workflow is selected without a secret key.
    pub fn new(config: RegistrationConfig, store: Arc<dyn RegistrationStore>) -> Result<Self> {
        let signer = config
            .secret_key()
            .map(|secret| Signer::new(secret.clone(), REGISTRATION_SALT));

        if config.workflow() == Workflow::Hmac && signer.is_none() {
            return Err(anyhow!("the hmac workflow requires a secret key"));
        }

        Ok(Self {
            config,
            store,
            email_sender: Arc::new(LogEmailSender),
            clock: Arc::new(SystemClock),
            signals: Signals::new(),
            signer,
        })
    }

    #[must_use]
    pub fn with_email_sender(mut self, email_sender: Arc<dyn EmailSender>) -> Self {
        self.email_sender = email_sender;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    #[must_use]
    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    #[must_use]
    pub fn store(&self) -> &dyn RegistrationStore {
        self.store.as_ref()
    }

    /// Validate the form, store the account and send the activation email.
    ///
    /// # Errors
    /// `Closed` when registration is disabled, `Invalid` with field errors, or
    /// `Internal` when storage or hashing fails.
    #[instrument(skip_all, fields(workflow = %self.config.workflow()))]
    pub async fn register(
        &self,
        form: &RegistrationForm,
        request: &RequestContext,
    ) -> Result<Registered, RegistrationError> {
        if !self.config.registration_open() {
            return Err(RegistrationError::Closed);
        }

        let policy = self.config.form_policy();
        let cleaned = form.clean(policy).map_err(RegistrationError::Invalid)?;

        let mut errors = FormErrors::default();
        if self.store.username_exists(&cleaned.username).await? {
            errors.add("username", MSG_USERNAME_TAKEN);
        }
        if policy.unique_email && self.store.email_exists(&cleaned.email).await? {
            errors.add("email", MSG_EMAIL_TAKEN);
        }
        if !errors.is_empty() {
            return Err(RegistrationError::Invalid(errors));
        }

        let workflow = self.config.workflow();
        let password_hash = hash_password_blocking(cleaned.password.clone()).await?;
        let now = self.clock.now();

        let activation_key = match workflow {
            Workflow::Model => Some(keys::generate_activation_key(&cleaned.username)?),
            Workflow::Hmac | Workflow::Simple => None,
        };

        let new_user = NewUser {
            username: cleaned.username,
            email: cleaned.email,
            password_hash,
            is_active: !workflow.requires_activation(),
            date_joined: now,
        };

        let user = match self
            .store
            .create_user(new_user, activation_key.as_deref(), policy.unique_email)
            .await?
        {
            SignupOutcome::Created(user) => user,
            // Lost a race against a concurrent registration.
            SignupOutcome::UsernameTaken => {
                errors.add("username", MSG_USERNAME_TAKEN);
                return Err(RegistrationError::Invalid(errors));
            }
            SignupOutcome::EmailTaken => {
                errors.add("email", MSG_EMAIL_TAKEN);
                return Err(RegistrationError::Invalid(errors));
            }
        };

        let email_key = match workflow {
            Workflow::Model => activation_key,
            Workflow::Hmac => Some(self.sign_username(&user)?),
            Workflow::Simple => None,
        };
        let email_sent = email_key
            .as_deref()
            .is_some_and(|key| self.send_activation_email(&user, key));

        info!(user_id = %user.id, username = %user.username, "user registered");

        self.signals.user_registered.send(&UserRegistered {
            user: user.clone(),
            request: request.clone(),
        });

        Ok(Registered { user, email_sent })
    }

    /// Activate the account identified by `activation_key`.
    ///
    /// # Errors
    /// `InvalidKey`, `Expired`, `AlreadyActivated`, `Unsupported` for the simple workflow,
    /// or `Internal` on storage failures.
    #[instrument(skip_all, fields(workflow = %self.config.workflow()))]
    pub async fn activate(
        &self,
        activation_key: &str,
        request: &RequestContext,
    ) -> Result<User, ActivationError> {
        let user = match self.config.workflow() {
            Workflow::Model => self.activate_profile(activation_key).await?,
            Workflow::Hmac => self.activate_signed(activation_key).await?,
            Workflow::Simple => return Err(ActivationError::Unsupported),
        };

        info!(user_id = %user.id, username = %user.username, "user activated");

        self.signals.user_activated.send(&UserActivated {
            user: user.clone(),
            request: request.clone(),
        });

        Ok(user)
    }

    async fn activate_profile(&self, activation_key: &str) -> Result<User, ActivationError> {
        if !keys::is_well_formed(activation_key) {
            return Err(ActivationError::InvalidKey);
        }

        let Some((profile, user)) = self.store.find_profile_by_key(activation_key).await? else {
            return Err(ActivationError::InvalidKey);
        };

        if keys::activation_key_expired(
            &profile.activation_key,
            user.date_joined,
            self.config.activation_window(),
            self.clock.now(),
        ) {
            return Err(ActivationError::Expired);
        }

        self.store
            .consume_activation_key(profile.id, activation_key)
            .await?
            .ok_or(ActivationError::AlreadyActivated)
    }

    async fn activate_signed(&self, activation_key: &str) -> Result<User, ActivationError> {
        let signer = self.signer()?;

        let username = match signer.unsign(
            activation_key,
            self.config.activation_window(),
            self.clock.now(),
        ) {
            Ok(username) => username,
            Err(SigningError::Expired) => return Err(ActivationError::Expired),
            Err(err @ SigningError::InvalidKey) => {
                return Err(anyhow::Error::from(err).into());
            }
            Err(SigningError::Malformed | SigningError::BadSignature) => {
                return Err(ActivationError::InvalidKey);
            }
        };

        let Some(user) = self.store.find_user_by_username(&username).await? else {
            return Err(ActivationError::InvalidKey);
        };
        if user.is_active {
            return Err(ActivationError::AlreadyActivated);
        }

        self.store
            .activate_user(user.id)
            .await?
            .ok_or(ActivationError::AlreadyActivated)
    }

    /// Send the activation email again to inactive accounts registered with `email`
    /// whose activation window is still open.
    ///
    /// # Errors
    /// Returns an error on storage failures.
    #[instrument(skip_all, fields(workflow = %self.config.workflow()))]
    pub async fn resend_activation(&self, email: &str) -> Result<ResendOutcome> {
        let workflow = self.config.workflow();
        if !workflow.requires_activation() {
            return Ok(ResendOutcome::Noop);
        }

        let email = normalize_email(email);
        if !valid_email(&email) {
            return Ok(ResendOutcome::Noop);
        }

        let now = self.clock.now();
        let window = self.config.activation_window();
        let mut sent = 0;

        for user in self.store.find_inactive_users_by_email(&email).await? {
            if keys::window_elapsed(user.date_joined, window, now) {
                continue;
            }

            let key = match workflow {
                Workflow::Model => match self.store.find_profile_by_user(user.id).await? {
                    Some(profile) if profile.activation_key != ACTIVATED => profile.activation_key,
                    _ => continue,
                },
                Workflow::Hmac => self.sign_username(&user)?,
                Workflow::Simple => continue,
            };

            if self.send_activation_email(&user, &key) {
                sent += 1;
            }
        }

        if sent == 0 {
            Ok(ResendOutcome::Noop)
        } else {
            Ok(ResendOutcome::Sent(sent))
        }
    }

    /// Delete accounts whose activation window elapsed without being activated.
    ///
    /// # Errors
    /// Returns an error on storage failures.
    #[instrument(skip_all)]
    pub async fn delete_expired_users(&self) -> Result<u64> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.config.activation_window())
            .context("activation window is out of range")?;

        let deleted = self.store.delete_expired_users(cutoff).await?;
        info!(deleted, %cutoff, "deleted expired registrations");
        Ok(deleted)
    }

    fn signer(&self) -> Result<&Signer> {
        self.signer
            .as_ref()
            .ok_or_else(|| anyhow!("the hmac workflow requires a secret key"))
    }

    // Signed with `date_joined` so the window always counts from registration.
    fn sign_username(&self, user: &User) -> Result<String> {
        self.signer()?
            .sign(&user.username, user.date_joined)
            .context("failed to sign activation key")
    }

    fn send_activation_email(&self, user: &User, activation_key: &str) -> bool {
        let message = activation_email(
            &user.email,
            self.config.site_name(),
            &self.config.activation_url(activation_key),
            self.config.activation_days(),
        );

        match self.email_sender.send(&message) {
            Ok(()) => true,
            Err(err) => {
                // The account stays registered; the user can request the email again.
                error!(user_id = %user.id, "failed to send activation email: {err:#}");
                warn!(user_id = %user.id, "user registered without an activation email");
                false
            }
        }
    }
}
