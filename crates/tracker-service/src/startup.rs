//! Startup steps: opening the account store, seeding it, and checking the
//! bus. Any failure here is fatal to the service.

use std::sync::Arc;

use thiserror::Error;
use tracker_bus::{Bus, BusError};
use tracker_db::{
    open_pool, run_migrations, AccountStore, PoolSettings, MigrationError, PoolError,
    SqliteAccountStore, StoreError,
};
use tracker_types::Account;

use crate::config::DatabaseConfig;

/// Errors that stop the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {
    /// The database pool could not be created.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Schema migrations failed.
    #[error(transparent)]
    Migration(#[from] MigrationError),

    /// The account store is unreachable or seeding failed.
    #[error("account store: {0}")]
    Store(#[from] StoreError),

    /// The bus is unreachable.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// The HTTP listener could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    /// A blocking startup task did not complete.
    #[error("startup task failed: {0}")]
    Task(String),
}

/// Opens the SQLite account store, applies migrations and checks it responds.
///
/// # Errors
///
/// Returns `StartupError` if the pool, migrations or connectivity check fail.
pub fn open_account_store(config: &DatabaseConfig) -> Result<SqliteAccountStore, StartupError> {
    let pool = open_pool(
        &config.path,
        PoolSettings {
            busy_timeout_ms: config.busy_timeout_ms,
            max_size: config.pool_max_size,
        },
    )?;

    {
        let conn = pool.get().map_err(StoreError::from)?;
        let applied = run_migrations(&conn)?;
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let store = SqliteAccountStore::new(pool);
    store.ping()?;
    tracing::info!(path = %config.path, namespace = store.namespace(), "account store ready");
    Ok(store)
}

/// Writes the startup seed into `store`.
///
/// # Errors
///
/// Returns `StartupError::Store` if the upsert fails.
pub async fn seed_accounts(
    store: Arc<dyn AccountStore>,
    accounts: Vec<Account>,
) -> Result<(), StartupError> {
    let count = accounts.len();
    tokio::task::spawn_blocking(move || store.upsert_accounts(&accounts))
        .await
        .map_err(|e| StartupError::Task(e.to_string()))??;
    tracing::info!(count, "seeded account store");
    Ok(())
}

/// Checks that the bus responds.
///
/// # Errors
///
/// Returns `StartupError::Bus` if the ping fails.
pub async fn check_bus(bus: &dyn Bus) -> Result<(), StartupError> {
    bus.ping().await?;
    Ok(())
}
