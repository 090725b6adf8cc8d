use crate::{
    cli::{actions::store, telemetry},
    registration::{RegistrationConfig, Registrar},
};
use anyhow::Result;
use tracing::info;

#[derive(Debug)]
pub struct Args {
    pub dsn: String,
    pub config: RegistrationConfig,
}

/// Delete expired, never-activated accounts once and exit.
/// # Errors
/// Returns an error if the database is unreachable or the delete fails.
pub async fn execute(args: Args) -> Result<()> {
    info!(
        dsn = %super::server::redact_dsn(&args.dsn),
        activation_days = args.config.activation_days(),
        "Running cleanup"
    );

    let store = store::open(Some(&args.dsn)).await?;
    let registrar = Registrar::new(args.config, store)?;
    let result = registrar.delete_expired_users().await;
    telemetry::shutdown_tracer();

    let deleted = result?;
    println!("Deleted {deleted} expired registration(s)");
    Ok(())
}
