//! The account store contract and its SQLite implementation.
//!
//! Account records are kept as JSON documents keyed by
//! `(namespace, account_id)`. Every operation is blocking; async callers
//! should run them on `tokio::task::spawn_blocking`.

use rusqlite::{params, OptionalExtension};
use tracker_types::{Account, ACCOUNTS_NAMESPACE};

use crate::error::StoreError;
use crate::pool::DbPool;

/// Keyed storage of account records.
///
/// Implementations must report an unknown ID as [`StoreError::NotFound`] so
/// that callers can tell it apart from a store that is failing.
pub trait AccountStore: Send + Sync {
    /// Checks that the store is reachable.
    fn ping(&self) -> Result<(), StoreError>;

    /// Inserts or replaces every record in `accounts`.
    ///
    /// Either all records are written or none are.
    fn upsert_accounts(&self, accounts: &[Account]) -> Result<(), StoreError>;

    /// Returns the stored record for `account_id`.
    fn lookup(&self, account_id: &str) -> Result<Account, StoreError>;
}

/// SQLite-backed account store.
#[derive(Clone)]
pub struct SqliteAccountStore {
    pool: DbPool,
    namespace: String,
}

impl SqliteAccountStore {
    /// Creates a store over `pool` using the default accounts namespace.
    ///
    /// The pool's database must already have migrations applied.
    pub fn new(pool: DbPool) -> Self {
        Self::with_namespace(pool, ACCOUNTS_NAMESPACE)
    }

    /// Creates a store over `pool` scoped to `namespace`.
    pub fn with_namespace(pool: DbPool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    /// Returns the namespace records are stored under.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl AccountStore for SqliteAccountStore {
    fn ping(&self) -> Result<(), StoreError> {
        let conn = self.pool.get()?;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
        Ok(())
    }

    fn upsert_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO account_records (namespace, account_id, record_json)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (namespace, account_id)
                 DO UPDATE SET record_json = excluded.record_json, updated_at = datetime('now')",
            )?;
            for account in accounts {
                let record_json = serde_json::to_string(account)?;
                stmt.execute(params![self.namespace, account.id, record_json])?;
            }
        }
        tx.commit()?;

        tracing::debug!(
            namespace = %self.namespace,
            count = accounts.len(),
            "upserted account records"
        );
        Ok(())
    }

    fn lookup(&self, account_id: &str) -> Result<Account, StoreError> {
        let conn = self.pool.get()?;
        let record_json: Option<String> = conn
            .query_row(
                "SELECT record_json FROM account_records WHERE namespace = ?1 AND account_id = ?2",
                params![self.namespace, account_id],
                |row| row.get(0),
            )
            .optional()?;

        let record_json = record_json.ok_or_else(|| StoreError::NotFound(account_id.to_string()))?;
        Ok(serde_json::from_str(&record_json)?)
    }
}
