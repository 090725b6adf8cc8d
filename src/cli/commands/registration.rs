use clap::{
    Arg, ArgAction, Command,
    builder::{BoolishValueParser, ValueParser},
};
use url::Url;

use crate::registration::Workflow;

pub const ARG_WORKFLOW: &str = "workflow";
pub const ARG_ACTIVATION_DAYS: &str = "activation-days";
pub const ARG_REGISTRATION_OPEN: &str = "registration-open";
pub const ARG_SITE_NAME: &str = "site-name";
pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SECRET_KEY: &str = "secret-key";
pub const ARG_SUCCESS_URL: &str = "success-url";
pub const ARG_REQUIRE_TOS: &str = "require-tos";
pub const ARG_UNIQUE_EMAIL: &str = "unique-email";
pub const ARG_REJECT_FREE_EMAIL: &str = "reject-free-email";

#[must_use]
pub fn validator_workflow() -> ValueParser {
    ValueParser::from(|value: &str| value.parse::<Workflow>())
}

/// Activation links are built from this URL, so it must be absolute.
#[must_use]
pub fn validator_base_url() -> ValueParser {
    ValueParser::from(|value: &str| -> std::result::Result<String, String> {
        let parsed = Url::parse(value).map_err(|err| format!("invalid base URL: {err}"))?;
        if parsed.cannot_be_a_base() || !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!("base URL must be http(s): {value}"));
        }
        Ok(value.to_string())
    })
}

fn flag(name: &'static str, env: &'static str, help: &'static str) -> Arg {
    Arg::new(name)
        .long(name)
        .help(help)
        .env(env)
        .global(true)
        .action(ArgAction::SetTrue)
        .value_parser(BoolishValueParser::new())
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_WORKFLOW)
                .long(ARG_WORKFLOW)
                .help("Registration workflow: model (alias default), hmac, simple")
                .default_value("model")
                .env("REGISTRAR_WORKFLOW")
                .global(true)
                .value_parser(validator_workflow()),
        )
        .arg(
            Arg::new(ARG_ACTIVATION_DAYS)
                .long(ARG_ACTIVATION_DAYS)
                .help("Days an activation link stays valid")
                .default_value("7")
                .env("REGISTRAR_ACTIVATION_DAYS")
                .global(true)
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_REGISTRATION_OPEN)
                .long(ARG_REGISTRATION_OPEN)
                .help("Accept new registrations")
                .default_value("true")
                .env("REGISTRAR_REGISTRATION_OPEN")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(BoolishValueParser::new()),
        )
        .arg(
            Arg::new(ARG_SITE_NAME)
                .long(ARG_SITE_NAME)
                .help("Site name used in activation emails")
                .default_value("registrar")
                .env("REGISTRAR_SITE_NAME")
                .global(true),
        )
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public URL used to build activation links")
                .default_value("http://localhost:8080")
                .env("REGISTRAR_BASE_URL")
                .global(true)
                .value_parser(validator_base_url()),
        )
        .arg(
            Arg::new(ARG_SECRET_KEY)
                .long(ARG_SECRET_KEY)
                .help("Secret used to sign activation keys (required for the hmac workflow)")
                .env("REGISTRAR_SECRET_KEY")
                .hide_env_values(true)
                .global(true),
        )
        .arg(
            Arg::new(ARG_SUCCESS_URL)
                .long(ARG_SUCCESS_URL)
                .help("Redirect target after registering with the simple workflow")
                .default_value("/")
                .env("REGISTRAR_SUCCESS_URL")
                .global(true),
        )
        .arg(flag(
            ARG_REQUIRE_TOS,
            "REGISTRAR_REQUIRE_TOS",
            "Require accepting the terms of service",
        ))
        .arg(flag(
            ARG_UNIQUE_EMAIL,
            "REGISTRAR_UNIQUE_EMAIL",
            "Reject emails already used by another account",
        ))
        .arg(flag(
            ARG_REJECT_FREE_EMAIL,
            "REGISTRAR_REJECT_FREE_EMAIL",
            "Reject addresses from free webmail providers",
        ))
}
