use thiserror::Error;

use super::forms::FormErrors;

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("registration is closed")]
    Closed,
    #[error("{0}")]
    Invalid(FormErrors),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("activation key is invalid")]
    InvalidKey,
    #[error("activation key expired")]
    Expired,
    #[error("account is already activated")]
    AlreadyActivated,
    #[error("workflow does not use activation")]
    Unsupported,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ActivationError {
    /// Stable reason code shown on the activation failure page.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidKey => "invalid_key",
            Self::Expired => "expired",
            Self::AlreadyActivated => "already_activated",
            Self::Unsupported => "unsupported",
            Self::Internal(_) => "internal",
        }
    }
}
