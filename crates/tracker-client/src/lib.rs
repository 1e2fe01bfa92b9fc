//! CLI consumer for tracking events.
//!
//! Subscribes to the tracking events channel, keeps only allow-listed
//! accounts, suppresses stale and duplicate deliveries per account, and
//! prints what remains.

pub mod config;
pub mod display;
pub mod filter;
pub mod subscriber;

pub use display::{EventSink, WriterSink};
pub use filter::{Decision, DropReason, FilterDedupe, DEFAULT_ALLOWED_ACCOUNTS};
pub use subscriber::{RunSummary, Subscriber, SubscriberError, SubscriberState};
