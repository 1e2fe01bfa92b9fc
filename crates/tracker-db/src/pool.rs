//! Pooled SQLite connections for the account store.

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use thiserror::Error;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Sizing and lock-wait settings for [`open_pool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    /// How long a connection waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
    pub max_size: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            max_size: 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to open account database pool: {0}")]
    Build(#[from] r2d2::Error),
}

/// Opens a pool over the database file at `path`, creating it if needed.
///
/// Each connection is switched to WAL so lookups from the HTTP workers do
/// not block behind seeding writes. `:memory:` gives every connection its
/// own empty database and is only useful with `max_size = 1`.
///
/// # Errors
///
/// Returns [`PoolError::Build`] if the first connection cannot be opened
/// or configured.
pub fn open_pool(path: &str, settings: PoolSettings) -> Result<DbPool, PoolError> {
    let manager = SqliteConnectionManager::file(path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(move |conn| configure_connection(conn, settings.busy_timeout_ms));

    Ok(Pool::builder().max_size(settings.max_size).build(manager)?)
}

fn configure_connection(conn: &mut Connection, busy_timeout_ms: u64) -> rusqlite::Result<()> {
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    if !mode.eq_ignore_ascii_case("wal") && !mode.eq_ignore_ascii_case("memory") {
        return Err(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
            Some(format!("account database refused WAL journal mode ({mode})")),
        ));
    }
    conn.busy_timeout(Duration::from_millis(busy_timeout_ms))
}
