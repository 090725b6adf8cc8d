use crate::cli::actions::{Action, cleanup, server};
use crate::cli::commands::{CMD_CLEANUP, registration::*};
use crate::registration::{FormPolicy, RegistrationConfig, Workflow};
use anyhow::{Context, Result, anyhow};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((CMD_CLEANUP, sub_matches)) => {
            let dsn = sub_matches
                .get_one::<String>("dsn")
                .cloned()
                .context("cleanup requires --dsn")?;
            Ok(Action::Cleanup(cleanup::Args {
                dsn,
                config: registration_config(sub_matches)?,
            }))
        }
        Some((other, _)) => Err(anyhow!("unknown subcommand: {other}")),
        None => Ok(Action::Server(server::Args {
            port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
            dsn: matches.get_one::<String>("dsn").cloned(),
            config: registration_config(matches)?,
        })),
    }
}

fn registration_config(matches: &clap::ArgMatches) -> Result<RegistrationConfig> {
    let string = |name: &str| matches.get_one::<String>(name).cloned();
    let flag = |name: &str| matches.get_flag(name);

    let workflow = matches
        .get_one::<Workflow>(ARG_WORKFLOW)
        .copied()
        .unwrap_or_default();
    let secret_key = string(ARG_SECRET_KEY).filter(|secret| !secret.is_empty());
    if workflow == Workflow::Hmac && secret_key.is_none() {
        return Err(anyhow!(
            "missing required argument: --secret-key (required for the hmac workflow)"
        ));
    }

    let base_url = string(ARG_BASE_URL).context("missing required argument: --base-url")?;

    let mut config = RegistrationConfig::new(base_url)
        .with_workflow(workflow)
        .with_activation_days(
            matches
                .get_one::<u32>(ARG_ACTIVATION_DAYS)
                .copied()
                .unwrap_or(7),
        )
        .with_registration_open(
            matches
                .get_one::<bool>(ARG_REGISTRATION_OPEN)
                .copied()
                .unwrap_or(true),
        )
        .with_form_policy(FormPolicy {
            require_tos: flag(ARG_REQUIRE_TOS),
            unique_email: flag(ARG_UNIQUE_EMAIL),
            reject_free_email: flag(ARG_REJECT_FREE_EMAIL),
        });

    if let Some(site_name) = string(ARG_SITE_NAME) {
        config = config.with_site_name(site_name);
    }
    if let Some(success_url) = string(ARG_SUCCESS_URL) {
        config = config.with_success_url(success_url);
    }
    if let Some(secret_key) = secret_key {
        config = config.with_secret_key(SecretString::from(secret_key));
    }

    Ok(config)
}
