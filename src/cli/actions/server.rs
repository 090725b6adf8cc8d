use crate::{
    api,
    cli::{actions::store, telemetry},
    registration::{RegistrationConfig, Registrar},
};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: Option<String>,
    pub config: RegistrationConfig,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the store cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let store = store::open(args.dsn.as_deref()).await?;
    let registrar = Arc::new(Registrar::new(args.config, store)?);

    let result = api::new(args.port, registrar).await;
    telemetry::shutdown_tracer();
    result
}

fn log_startup_args(args: &Args) {
    let config = &args.config;
    let policy = config.form_policy();
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        (
            "dsn",
            args.dsn
                .as_deref()
                .map_or_else(|| "memory".to_string(), redact_dsn),
        ),
        ("workflow", config.workflow().to_string()),
        ("activation_days", config.activation_days().to_string()),
        ("registration_open", config.registration_open().to_string()),
        ("base_url", config.base_url().to_string()),
        ("site_name", config.site_name().to_string()),
        ("secret_key_set", config.secret_key().is_some().to_string()),
        ("require_tos", policy.require_tos.to_string()),
        ("unique_email", policy.unique_email.to_string()),
        ("reject_free_email", policy.reject_free_email.to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

pub(super) fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "{} {} - {}\n\n{title}:",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}
