//! Account storage for the tracking events pipeline.
//!
//! Provides SQLite connection pooling (via `r2d2`), WAL-mode initialization,
//! embedded SQL migrations, and the [`AccountStore`] contract the ingestion
//! service authorizes events against.
//!
//! Two implementations are provided:
//!
//! - [`SqliteAccountStore`]: records persisted as JSON documents in the
//!   `account_records` table under a fixed namespace.
//! - [`MemoryAccountStore`]: an in-process map, used where no database is
//!   wanted (tests, local experiments).

mod accounts;
mod error;
mod memory;
mod migrations;
mod pool;

pub use accounts::{AccountStore, SqliteAccountStore};
pub use error::StoreError;
pub use memory::MemoryAccountStore;
pub use migrations::{run_migrations, MigrationError};
pub use pool::{open_pool, DbPool, PoolError, PoolSettings};
