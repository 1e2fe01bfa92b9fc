//! In-process account store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use tracker_types::Account;

use crate::accounts::AccountStore;
use crate::error::StoreError;

/// An [`AccountStore`] held entirely in memory.
///
/// Can be switched offline to simulate a store that cannot be reached, in
/// which case every operation fails with [`StoreError::Unavailable`].
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    records: RwLock<HashMap<String, Account>>,
    offline: AtomicBool,
}

impl MemoryAccountStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `accounts`.
    pub fn with_accounts(accounts: &[Account]) -> Self {
        let store = Self::new();
        {
            let mut records = match store.records.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            for account in accounts {
                records.insert(account.id.clone(), account.clone());
            }
        }
        store
    }

    /// Marks the store reachable or unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store is offline".to_string()));
        }
        Ok(())
    }
}

impl AccountStore for MemoryAccountStore {
    fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    fn upsert_accounts(&self, accounts: &[Account]) -> Result<(), StoreError> {
        self.check_online()?;
        let mut records = self
            .records
            .write()
            .map_err(|_| StoreError::Unavailable("account map lock poisoned".to_string()))?;
        for account in accounts {
            records.insert(account.id.clone(), account.clone());
        }
        Ok(())
    }

    fn lookup(&self, account_id: &str) -> Result<Account, StoreError> {
        self.check_online()?;
        let records = self
            .records
            .read()
            .map_err(|_| StoreError::Unavailable("account map lock poisoned".to_string()))?;
        records
            .get(account_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(account_id.to_string()))
    }
}
