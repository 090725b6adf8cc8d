//! Activation email rendering and delivery abstractions.
//!
//! Delivery itself is pluggable: the registrar hands a rendered [`EmailMessage`] to an
//! [`EmailSender`]. The default sender for local dev is [`LogEmailSender`], which logs
//! the message and returns `Ok(())`. An SMTP or API backed sender implements the same
//! trait.

use anyhow::Result;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the registrar.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "activation email send stub"
        );
        Ok(())
    }
}

/// Render the activation email for `to_email`.
#[must_use]
pub fn activation_email(
    to_email: &str,
    site_name: &str,
    activation_url: &str,
    activation_days: u32,
) -> EmailMessage {
    // Header injection guard: subjects must stay on one line.
    let subject = format!("Activate your account at {site_name}")
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let body = format!(
        "Someone, hopefully you, registered an account at {site_name} using this email address.\n\
         \n\
         To activate the account, open the following link within {activation_days} days:\n\
         \n\
         {activation_url}\n\
         \n\
         If you did not register, ignore this message and the account will not be activated.\n"
    );

    EmailMessage {
        to_email: to_email.to_string(),
        subject,
        body,
    }
}
