//! Authorization of incoming events against account state.

use std::sync::Arc;

use thiserror::Error;
use tracker_db::{AccountStore, StoreError};
use tracker_types::TrackingEvent;

use crate::publisher::Publisher;

/// Source of the wall-clock time stamped onto accepted events.
pub trait Clock: Send + Sync {
    /// Current time in whole seconds since the unix epoch.
    fn now_unix(&self) -> i64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Why an ingestion request was not accepted.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The account exists but may not submit events.
    #[error("account is not active: {0}")]
    Inactive(String),

    /// The account is unknown or the store failed.
    #[error("failed to validate account: {0}")]
    Lookup(#[source] StoreError),

    /// The blocking lookup task did not complete.
    #[error("account lookup task failed: {0}")]
    Task(String),
}

/// Validates events against the account store and queues accepted ones.
pub struct IngestionGate {
    store: Arc<dyn AccountStore>,
    publisher: Publisher,
    clock: Arc<dyn Clock>,
}

impl IngestionGate {
    /// Creates a gate stamping events with the system clock.
    pub fn new(store: Arc<dyn AccountStore>, publisher: Publisher) -> Self {
        Self::with_clock(store, publisher, Arc::new(SystemClock))
    }

    /// Creates a gate with an explicit clock.
    pub fn with_clock(
        store: Arc<dyn AccountStore>,
        publisher: Publisher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            publisher,
            clock,
        }
    }

    /// Authorizes and queues one event for `account_id`.
    ///
    /// On success the event has been handed to the publisher, not
    /// necessarily published: the bus may receive it after the caller has
    /// already seen the result. The active flag is checked once; a change
    /// between the check and the publish is not detected.
    ///
    /// # Errors
    ///
    /// - [`IngestError::Inactive`] if the account exists but is inactive.
    /// - [`IngestError::Lookup`] if the account is unknown or the store fails.
    /// - [`IngestError::Task`] if the lookup task panicked.
    pub async fn handle(&self, account_id: &str, data: String) -> Result<TrackingEvent, IngestError> {
        let store = Arc::clone(&self.store);
        let lookup_id = account_id.to_string();
        let account = tokio::task::spawn_blocking(move || store.lookup(&lookup_id))
            .await
            .map_err(|e| {
                tracing::error!(account_id, error = %e, "account lookup task join error");
                IngestError::Task(e.to_string())
            })?
            .map_err(|e| {
                if e.is_not_found() {
                    tracing::warn!(account_id, "rejecting event for unknown account");
                } else {
                    tracing::error!(account_id, error = %e, "account store failure");
                }
                IngestError::Lookup(e)
            })?;

        if !account.is_active {
            tracing::info!(account_id, "account is not active");
            return Err(IngestError::Inactive(account.id));
        }

        let event = TrackingEvent::new(account_id, self.clock.now_unix(), data);
        self.publisher.publish(event.clone());
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::spawn_publisher;
    use tracker_bus::{Bus, LocalBus};
    use tracker_db::MemoryAccountStore;
    use tracker_types::default_seed_accounts;

    struct FixedClock(i64);

    impl Clock for FixedClock {
        fn now_unix(&self) -> i64 {
            self.0
        }
    }

    fn gate_with(store: Arc<MemoryAccountStore>, bus: Arc<LocalBus>) -> IngestionGate {
        let (publisher, _task) = spawn_publisher(bus, "events", 8);
        IngestionGate::with_clock(store, publisher, Arc::new(FixedClock(1_700_000_000)))
    }

    #[tokio::test]
    async fn active_account_is_stamped_and_published() {
        let bus = Arc::new(LocalBus::new());
        let mut sub = bus.subscribe("events").await.unwrap();
        let store = Arc::new(MemoryAccountStore::with_accounts(&default_seed_accounts()));
        let gate = gate_with(store, bus);

        let event = gate.handle("3", "payload".to_string()).await.unwrap();
        assert_eq!(event, TrackingEvent::new("3", 1_700_000_000, "payload"));

        let msg = sub.next().await.unwrap();
        assert_eq!(TrackingEvent::from_wire(&msg.payload).unwrap(), event);
    }

    #[tokio::test]
    async fn inactive_account_is_rejected() {
        let store = Arc::new(MemoryAccountStore::with_accounts(&default_seed_accounts()));
        let gate = gate_with(store, Arc::new(LocalBus::new()));

        let err = gate.handle("2", "x".to_string()).await.unwrap_err();
        assert!(matches!(err, IngestError::Inactive(id) if id == "2"));
    }

    #[tokio::test]
    async fn unknown_account_and_store_outage_are_lookup_failures() {
        let store = Arc::new(MemoryAccountStore::with_accounts(&default_seed_accounts()));
        let gate = gate_with(store.clone(), Arc::new(LocalBus::new()));

        match gate.handle("404", "x".to_string()).await.unwrap_err() {
            IngestError::Lookup(e) => assert!(e.is_not_found()),
            other => panic!("unexpected error: {other:?}"),
        }

        store.set_offline(true);
        match gate.handle("1", "x".to_string()).await.unwrap_err() {
            IngestError::Lookup(e) => assert!(!e.is_not_found()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_unix() > 1_577_836_800);
    }
}
