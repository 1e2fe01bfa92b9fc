//! Shared types and constants for the tracking events pipeline.
//!
//! Both sides of the pipeline depend on this crate: the ingestion service
//! encodes [`TrackingEvent`]s onto the bus, and the CLI consumer decodes
//! them. Keeping the wire type here means the two binaries cannot drift on
//! field names.

use serde::{Deserialize, Serialize};

/// Name of the single pub/sub channel carrying tracking events.
pub const TRACKING_EVENTS_CHANNEL: &str = "tracking-events";

/// Fixed namespace under which account records are stored.
pub const ACCOUNTS_NAMESPACE: &str = "accounts";

/// An account record as held by the account store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Unique account identifier.
    #[serde(rename = "accountId")]
    pub id: String,
    /// Human-readable account name.
    #[serde(rename = "accountName")]
    pub name: String,
    /// Only active accounts may submit events.
    #[serde(rename = "isActive")]
    pub is_active: bool,
}

impl Account {
    /// Creates a new account record.
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_active: bool) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active,
        }
    }
}

/// The accounts seeded into the store when no other seed list is configured.
///
/// Account `2` is inactive; every other account may submit events.
pub fn default_seed_accounts() -> Vec<Account> {
    vec![
        Account::new("1", "Account 1", true),
        Account::new("2", "Account 2", false),
        Account::new("3", "Account 3", true),
        Account::new("4", "Account 4", true),
    ]
}

/// A single account-scoped tracking event.
///
/// This is also the bus wire format: a JSON object with exactly the fields
/// `accountId`, `timestamp` (unix seconds) and `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingEvent {
    /// The account the event belongs to.
    #[serde(rename = "accountId")]
    pub account_id: String,
    /// Seconds since the unix epoch at which the event was accepted.
    pub timestamp: i64,
    /// Opaque caller-supplied payload.
    pub data: String,
}

impl TrackingEvent {
    /// Creates a new event.
    pub fn new(account_id: impl Into<String>, timestamp: i64, data: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            timestamp,
            data: data.into(),
        }
    }

    /// Encodes the event into its canonical JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if encoding fails.
    pub fn to_wire(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes an event from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the payload is not valid
    /// JSON or is missing one of the three fields.
    pub fn from_wire(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}
