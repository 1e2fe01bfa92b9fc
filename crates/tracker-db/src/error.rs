//! Error types for account store operations.

use thiserror::Error;

/// Errors returned by an [`AccountStore`](crate::AccountStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists for the requested account ID.
    #[error("account not found: {0}")]
    NotFound(String),

    /// A SQLite statement failed.
    #[error("account store database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection could be obtained.
    #[error("account store connection failed: {0}")]
    Pool(#[from] r2d2::Error),

    /// A stored record could not be encoded or decoded.
    #[error("account record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store cannot be reached at all.
    #[error("account store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns `true` when the error means the account is unknown, as
    /// opposed to the store itself failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
