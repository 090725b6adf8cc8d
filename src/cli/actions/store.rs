use crate::registration::{MemoryStore, PgStore, RegistrationStore};
use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use std::{sync::Arc, time::Duration};
use tracing::warn;

/// Connect to Postgres when a DSN is given, otherwise fall back to memory.
pub(super) async fn open(dsn: Option<&str>) -> Result<Arc<dyn RegistrationStore>> {
    let Some(dsn) = dsn else {
        warn!("No --dsn given: accounts are kept in memory and lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(dsn)
        .await
        .context("Failed to connect to database")?;

    Ok(Arc::new(PgStore::new(pool)))
}
