//! Registration form validation.
//!
//! [`RegistrationForm::clean`] performs every check that does not need storage. The
//! registrar adds the uniqueness errors (username always, email when
//! [`FormPolicy::unique_email`] is set) before anything is written.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const USERNAME_MAX_LEN: usize = 30;

/// Domains rejected when [`FormPolicy::reject_free_email`] is enabled.
pub const FREE_EMAIL_DOMAINS: [&str; 12] = [
    "aim.com",
    "aol.com",
    "email.com",
    "gmail.com",
    "googlemail.com",
    "hotmail.com",
    "hushmail.com",
    "msn.com",
    "mail.ru",
    "mailinator.com",
    "live.com",
    "yahoo.com",
];

pub(crate) const MSG_REQUIRED: &str = "This field is required.";
pub(crate) const MSG_USERNAME_CHARS: &str =
    "This value may contain only letters, numbers and @/./+/-/_ characters.";
pub(crate) const MSG_USERNAME_LENGTH: &str =
    "Ensure this value has at most 30 characters.";
pub(crate) const MSG_USERNAME_TAKEN: &str = "A user with that username already exists.";
pub(crate) const MSG_EMAIL_INVALID: &str = "Enter a valid email address.";
pub(crate) const MSG_EMAIL_TAKEN: &str =
    "This email address is already in use. Please supply a different email address.";
pub(crate) const MSG_FREE_EMAIL: &str = "Registration using free email addresses is prohibited. Please supply a different email address.";
pub(crate) const MSG_PASSWORD_MISMATCH: &str = "The two password fields didn't match.";
pub(crate) const MSG_TOS: &str = "You must agree to the terms to register";

/// Optional checks layered on top of the base form.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormPolicy {
    pub require_tos: bool,
    pub unique_email: bool,
    pub reject_free_email: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
    #[serde(default)]
    pub tos: bool,
}

/// Form data after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CleanedRegistration {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Validation errors keyed by field name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn add(&mut self, field: &str, message: &str) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.to_string());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl std::fmt::Display for FormErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

impl RegistrationForm {
    /// Run the storage-independent checks.
    ///
    /// # Errors
    /// Returns every field error found, not just the first one.
    pub fn clean(&self, policy: FormPolicy) -> Result<CleanedRegistration, FormErrors> {
        let mut errors = FormErrors::default();

        let username = self.username.trim();
        if username.is_empty() {
            errors.add("username", MSG_REQUIRED);
        } else if username.chars().count() > USERNAME_MAX_LEN {
            errors.add("username", MSG_USERNAME_LENGTH);
        } else if !valid_username(username) {
            errors.add("username", MSG_USERNAME_CHARS);
        }

        let email = normalize_email(&self.email);
        if email.is_empty() {
            errors.add("email", MSG_REQUIRED);
        } else if !valid_email(&email) {
            errors.add("email", MSG_EMAIL_INVALID);
        } else if policy.reject_free_email && is_free_email(&email) {
            errors.add("email", MSG_FREE_EMAIL);
        }

        if self.password1.is_empty() {
            errors.add("password1", MSG_REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", MSG_REQUIRED);
        }
        if !self.password1.is_empty()
            && !self.password2.is_empty()
            && self.password1 != self.password2
        {
            errors.add("password2", MSG_PASSWORD_MISMATCH);
        }

        if policy.require_tos && !self.tos {
            errors.add("tos", MSG_TOS);
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(CleanedRegistration {
            username: username.to_string(),
            email,
            password: self.password1.clone(),
        })
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

fn valid_username(username: &str) -> bool {
    Regex::new(r"^[\w.@+-]+$").is_ok_and(|regex| regex.is_match(username))
}

fn is_free_email(email_normalized: &str) -> bool {
    email_normalized
        .rsplit_once('@')
        .is_some_and(|(_, domain)| FREE_EMAIL_DOMAINS.contains(&domain))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegistrationForm {
        RegistrationForm {
            username: "alice".to_string(),
            email: "Alice@Example.COM ".to_string(),
            password1: "swordfish".to_string(),
            password2: "swordfish".to_string(),
            tos: false,
        }
    }

    #[test]
    fn clean_accepts_valid_form_and_normalizes_email() {
        let cleaned = form().clean(FormPolicy::default());
        assert_eq!(
            cleaned,
            Ok(CleanedRegistration {
                username: "alice".to_string(),
                email: "alice@example.com".to_string(),
                password: "swordfish".to_string(),
            })
        );
    }

    #[test]
    fn clean_reports_all_missing_fields() {
        let errors = RegistrationForm::default()
            .clean(FormPolicy::default())
            .err()
            .unwrap_or_default();
        for field in ["username", "email", "password1", "password2"] {
            assert_eq!(errors.field(field), [MSG_REQUIRED.to_string()], "{field}");
        }
    }

    #[test]
    fn clean_rejects_bad_username_characters_and_length() {
        let mut bad = form();
        bad.username = "alice smith".to_string();
        let errors = bad.clean(FormPolicy::default()).err().unwrap_or_default();
        assert_eq!(errors.field("username"), [MSG_USERNAME_CHARS.to_string()]);

        bad.username = "a".repeat(USERNAME_MAX_LEN + 1);
        let errors = bad.clean(FormPolicy::default()).err().unwrap_or_default();
        assert_eq!(errors.field("username"), [MSG_USERNAME_LENGTH.to_string()]);

        bad.username = "a".repeat(USERNAME_MAX_LEN);
        assert!(bad.clean(FormPolicy::default()).is_ok());

        let mut ok = form();
        ok.username = "a.b+c-d_e@f".to_string();
        assert!(ok.clean(FormPolicy::default()).is_ok());
    }

    #[test]
    fn clean_rejects_mismatched_passwords() {
        let mut bad = form();
        bad.password2 = "swordfish2".to_string();
        let errors = bad.clean(FormPolicy::default()).err().unwrap_or_default();
        assert_eq!(errors.field("password2"), [MSG_PASSWORD_MISMATCH.to_string()]);
        assert!(!errors.has("password1"));
    }

    #[test]
    fn clean_rejects_invalid_email() {
        let mut bad = form();
        bad.email = "not-an-email".to_string();
        let errors = bad.clean(FormPolicy::default()).err().unwrap_or_default();
        assert_eq!(errors.field("email"), [MSG_EMAIL_INVALID.to_string()]);
    }

    #[test]
    fn tos_policy_requires_agreement() {
        let policy = FormPolicy {
            require_tos: true,
            ..FormPolicy::default()
        };
        let errors = form().clean(policy).err().unwrap_or_default();
        assert_eq!(errors.field("tos"), [MSG_TOS.to_string()]);

        let mut agreed = form();
        agreed.tos = true;
        assert!(agreed.clean(policy).is_ok());
    }

    #[test]
    fn free_email_policy_rejects_listed_domains_only() {
        let policy = FormPolicy {
            reject_free_email: true,
            ..FormPolicy::default()
        };
        for domain in FREE_EMAIL_DOMAINS {
            let mut bad = form();
            bad.email = format!("alice@{domain}");
            let errors = bad.clean(policy).err().unwrap_or_default();
            assert_eq!(errors.field("email"), [MSG_FREE_EMAIL.to_string()], "{domain}");
        }

        assert!(form().clean(policy).is_ok());
        assert!(form().clean(FormPolicy::default()).is_ok());

        let mut subdomain = form();
        subdomain.email = "alice@corp.gmail.com.example.org".to_string();
        assert!(subdomain.clean(policy).is_ok());
    }

    #[test]
    fn form_errors_serialize_as_field_map() -> anyhow::Result<()> {
        let mut errors = FormErrors::default();
        errors.add("username", MSG_USERNAME_TAKEN);
        errors.add("email", MSG_EMAIL_TAKEN);
        let value = serde_json::to_value(&errors)?;
        assert_eq!(value["username"][0], MSG_USERNAME_TAKEN);
        assert_eq!(value["email"][0], MSG_EMAIL_TAKEN);
        assert_eq!(errors.to_string(), "invalid fields: email, username");
        Ok(())
    }
}
