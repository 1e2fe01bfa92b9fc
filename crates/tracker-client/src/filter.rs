//! Allow-list filtering and per-account timestamp deduplication.

use std::collections::{HashMap, HashSet};

use tracker_types::TrackingEvent;

/// Account IDs the CLI consumer displays.
pub const DEFAULT_ALLOWED_ACCOUNTS: &[&str] = &["1", "3"];

/// Why a message was not displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The payload did not decode into an event.
    Malformed,
    /// The account is not on the allow-list.
    NotAllowed,
    /// The timestamp is not newer than the last one displayed for the account.
    Stale,
}

/// Outcome of [`FilterDedupe::admit`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Show the event.
    Display(TrackingEvent),
    /// Skip the message.
    Drop(DropReason),
}

/// Per-consumer gate in front of the display sink.
///
/// An event passes only if its account is allowed and its timestamp is
/// strictly greater than the last one passed for that account. Events are
/// identified by `(account, timestamp)` alone, so two distinct events from
/// the same account in the same second are indistinguishable and the second
/// is dropped.
///
/// The high-water marks live only in memory; a fresh instance accepts
/// everything again.
#[derive(Debug, Clone)]
pub struct FilterDedupe {
    allowed: HashSet<String>,
    last_seen: HashMap<String, i64>,
}

impl FilterDedupe {
    /// Creates a filter admitting only `allowed` account IDs.
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
            last_seen: HashMap::new(),
        }
    }

    /// Decides whether the raw bus payload should be displayed.
    pub fn admit(&mut self, raw: &[u8]) -> Decision {
        let event = match TrackingEvent::from_wire(raw) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "failed to decode event payload, skipping");
                return Decision::Drop(DropReason::Malformed);
            }
        };

        if !self.allowed.contains(&event.account_id) {
            return Decision::Drop(DropReason::NotAllowed);
        }

        if let Some(&last) = self.last_seen.get(&event.account_id) {
            if event.timestamp <= last {
                tracing::debug!(
                    account_id = %event.account_id,
                    timestamp = event.timestamp,
                    last_seen = last,
                    "dropping stale or duplicate event"
                );
                return Decision::Drop(DropReason::Stale);
            }
        }

        self.last_seen
            .insert(event.account_id.clone(), event.timestamp);
        Decision::Display(event)
    }

    /// The newest timestamp displayed for `account_id`, if any.
    pub fn last_seen(&self, account_id: &str) -> Option<i64> {
        self.last_seen.get(account_id).copied()
    }

    /// Whether `account_id` is on the allow-list.
    pub fn allows(&self, account_id: &str) -> bool {
        self.allowed.contains(account_id)
    }
}

impl Default for FilterDedupe {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_ACCOUNTS.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(account_id: &str, timestamp: i64) -> Vec<u8> {
        TrackingEvent::new(account_id, timestamp, "d").to_wire().unwrap()
    }

    fn displayed_timestamps(filter: &mut FilterDedupe, account_id: &str, input: &[i64]) -> Vec<i64> {
        input
            .iter()
            .filter_map(|&ts| match filter.admit(&wire(account_id, ts)) {
                Decision::Display(event) => Some(event.timestamp),
                Decision::Drop(_) => None,
            })
            .collect()
    }

    #[test]
    fn duplicates_and_older_timestamps_are_dropped() {
        let mut filter = FilterDedupe::default();
        assert_eq!(
            displayed_timestamps(&mut filter, "1", &[100, 100, 99, 150]),
            vec![100, 150]
        );
        assert_eq!(filter.last_seen("1"), Some(150));
    }

    #[test]
    fn equal_timestamp_is_reported_as_stale() {
        let mut filter = FilterDedupe::default();
        assert!(matches!(filter.admit(&wire("3", 5)), Decision::Display(_)));
        assert_eq!(filter.admit(&wire("3", 5)), Decision::Drop(DropReason::Stale));
    }

    #[test]
    fn accounts_are_tracked_independently() {
        let mut filter = FilterDedupe::default();
        assert!(matches!(filter.admit(&wire("1", 200)), Decision::Display(_)));
        assert!(matches!(filter.admit(&wire("3", 100)), Decision::Display(_)));
        assert_eq!(filter.last_seen("1"), Some(200));
        assert_eq!(filter.last_seen("3"), Some(100));
    }

    #[test]
    fn accounts_off_the_allow_list_never_display() {
        let mut filter = FilterDedupe::new(["1", "3"]);
        for ts in [i64::MIN, -1, 0, 1, 1_700_000_000, i64::MAX] {
            assert_eq!(
                filter.admit(&wire("2", ts)),
                Decision::Drop(DropReason::NotAllowed)
            );
            assert_eq!(
                filter.admit(&wire("4", ts)),
                Decision::Drop(DropReason::NotAllowed)
            );
        }
        assert_eq!(filter.last_seen("2"), None);
        assert_eq!(filter.last_seen("4"), None);
    }

    #[test]
    fn malformed_payload_is_dropped_without_touching_state() {
        let mut filter = FilterDedupe::default();
        assert_eq!(filter.admit(b"{not json"), Decision::Drop(DropReason::Malformed));
        assert_eq!(
            filter.admit(br#"{"accountId":"1","data":"no timestamp"}"#),
            Decision::Drop(DropReason::Malformed)
        );
        assert_eq!(filter.last_seen("1"), None);

        // The next good message is unaffected.
        assert!(matches!(filter.admit(&wire("1", 1)), Decision::Display(_)));
    }

    #[test]
    fn fresh_instance_forgets_high_water_marks() {
        let mut first = FilterDedupe::default();
        assert!(matches!(first.admit(&wire("1", 100)), Decision::Display(_)));
        assert_eq!(first.admit(&wire("1", 100)), Decision::Drop(DropReason::Stale));

        let mut restarted = FilterDedupe::default();
        assert!(matches!(restarted.admit(&wire("1", 100)), Decision::Display(_)));
    }

    #[test]
    fn default_allow_list_is_one_and_three() {
        let filter = FilterDedupe::default();
        assert!(filter.allows("1"));
        assert!(filter.allows("3"));
        assert!(!filter.allows("2"));
        assert!(!filter.allows("4"));
    }
}
