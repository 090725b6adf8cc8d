//! Registration settings shared by every workflow.

use chrono::Duration;
use secrecy::SecretString;

use super::{forms::FormPolicy, keys::activation_window, workflow::Workflow};

const DEFAULT_ACTIVATION_DAYS: u32 = 7;
const DEFAULT_SITE_NAME: &str = "registrar";
const DEFAULT_SUCCESS_URL: &str = "/";

#[derive(Clone, Debug)]
pub struct RegistrationConfig {
    base_url: String,
    site_name: String,
    workflow: Workflow,
    activation_days: u32,
    registration_open: bool,
    secret_key: Option<SecretString>,
    success_url: String,
    form_policy: FormPolicy,
}

impl RegistrationConfig {
    #[must_use]
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            site_name: DEFAULT_SITE_NAME.to_string(),
            workflow: Workflow::Model,
            activation_days: DEFAULT_ACTIVATION_DAYS,
            registration_open: true,
            secret_key: None,
            success_url: DEFAULT_SUCCESS_URL.to_string(),
            form_policy: FormPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_site_name(mut self, site_name: String) -> Self {
        self.site_name = site_name;
        self
    }

    #[must_use]
    pub fn with_workflow(mut self, workflow: Workflow) -> Self {
        self.workflow = workflow;
        self
    }

    #[must_use]
    pub fn with_activation_days(mut self, days: u32) -> Self {
        self.activation_days = days;
        self
    }

    #[must_use]
    pub fn with_registration_open(mut self, open: bool) -> Self {
        self.registration_open = open;
        self
    }

    #[must_use]
    pub fn with_secret_key(mut self, secret_key: SecretString) -> Self {
        self.secret_key = Some(secret_key);
        self
    }

    #[must_use]
    pub fn with_success_url(mut self, success_url: String) -> Self {
        self.success_url = success_url;
        self
    }

    #[must_use]
    pub fn with_form_policy(mut self, form_policy: FormPolicy) -> Self {
        self.form_policy = form_policy;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn site_name(&self) -> &str {
        &self.site_name
    }

    #[must_use]
    pub fn workflow(&self) -> Workflow {
        self.workflow
    }

    #[must_use]
    pub fn activation_days(&self) -> u32 {
        self.activation_days
    }

    #[must_use]
    pub fn activation_window(&self) -> Duration {
        activation_window(self.activation_days)
    }

    #[must_use]
    pub fn registration_open(&self) -> bool {
        self.registration_open
    }

    #[must_use]
    pub fn secret_key(&self) -> Option<&SecretString> {
        self.secret_key.as_ref()
    }

    #[must_use]
    pub fn success_url(&self) -> &str {
        &self.success_url
    }

    #[must_use]
    pub fn form_policy(&self) -> FormPolicy {
        self.form_policy
    }

    /// Link emailed to the user for `activation_key`.
    #[must_use]
    pub fn activation_url(&self, activation_key: &str) -> String {
        format!("{}/activate/{activation_key}", self.base_url)
    }
}
