//! Best-effort event publishing.
//!
//! Accepted events are queued on a bounded channel and published to the bus
//! by a single background worker, so the request path never waits on bus
//! I/O. When the queue is full new events are shed rather than blocking the
//! caller. Failures are logged and the event is dropped; nothing is retried.
//!
//! Shutdown is explicit: once every [`Publisher`] handle has been dropped the
//! worker drains what is already queued and exits, and
//! [`PublisherTask::join_with_timeout`] bounds how long the caller waits for
//! that drain.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracker_bus::{Bus, BusError};
use tracker_types::TrackingEvent;

/// Why a single publish attempt failed.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The event could not be encoded.
    #[error("failed to encode event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bus rejected the message.
    #[error("failed to publish event: {0}")]
    Transport(#[from] BusError),
}

/// What happened to an event handed to [`Publisher::publish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishQueued {
    /// The event is waiting for the worker.
    Queued,
    /// The queue was full; the event was dropped.
    DroppedFull,
    /// The worker has stopped; the event was dropped.
    DroppedClosed,
}

/// Counters reported by the worker when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    /// Events the bus accepted.
    pub published: u64,
    /// Events dropped because encoding or the transport failed.
    pub failed: u64,
}

/// Handle for queueing events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Publisher {
    tx: mpsc::Sender<TrackingEvent>,
}

impl Publisher {
    /// Queues `event` for publishing without waiting.
    pub fn publish(&self, event: TrackingEvent) -> PublishQueued {
        match self.tx.try_send(event) {
            Ok(()) => PublishQueued::Queued,
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    account_id = %event.account_id,
                    "publish queue full, dropping event"
                );
                PublishQueued::DroppedFull
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    account_id = %event.account_id,
                    "publisher stopped, dropping event"
                );
                PublishQueued::DroppedClosed
            }
        }
    }
}

/// The running publish worker.
#[derive(Debug)]
pub struct PublisherTask {
    handle: JoinHandle<PublishStats>,
}

impl PublisherTask {
    /// Waits for the worker to drain its queue and exit.
    ///
    /// The worker only exits after every [`Publisher`] handle is dropped.
    pub async fn join(self) -> PublishStats {
        match self.handle.await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::error!(error = %e, "publisher task join error");
                PublishStats::default()
            }
        }
    }

    /// Like [`join`](Self::join), but gives up after `timeout`.
    ///
    /// Returns `None` if the drain did not finish in time; events still
    /// queued at that point are lost when the runtime shuts down.
    pub async fn join_with_timeout(self, timeout: Duration) -> Option<PublishStats> {
        match tokio::time::timeout(timeout, self.join()).await {
            Ok(stats) => Some(stats),
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "publisher did not drain before timeout"
                );
                None
            }
        }
    }
}

/// Starts the publish worker for `channel`.
///
/// `capacity` bounds how many events may wait for the bus; it is clamped to
/// at least one.
pub fn spawn_publisher(
    bus: Arc<dyn Bus>,
    channel: impl Into<String>,
    capacity: usize,
) -> (Publisher, PublisherTask) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let channel = channel.into();
    let handle = tokio::spawn(run_worker(bus, channel, rx));
    (Publisher { tx }, PublisherTask { handle })
}

async fn run_worker(
    bus: Arc<dyn Bus>,
    channel: String,
    mut rx: mpsc::Receiver<TrackingEvent>,
) -> PublishStats {
    tracing::info!(%channel, "publisher started");
    let mut stats = PublishStats::default();

    while let Some(event) = rx.recv().await {
        match publish_event(bus.as_ref(), &channel, &event).await {
            Ok(receivers) => {
                stats.published += 1;
                tracing::debug!(
                    account_id = %event.account_id,
                    timestamp = event.timestamp,
                    receivers,
                    "published event"
                );
            }
            Err(e) => {
                stats.failed += 1;
                tracing::error!(
                    account_id = %event.account_id,
                    error = %e,
                    "failed to publish event, dropping"
                );
            }
        }
    }

    tracing::info!(
        published = stats.published,
        failed = stats.failed,
        "publisher drained and stopped"
    );
    stats
}

/// Encodes `event` and pushes it to `channel` once.
///
/// # Errors
///
/// Returns `PublishError` if encoding or the bus fails. The caller decides
/// whether to log; this function never retries.
pub async fn publish_event(
    bus: &dyn Bus,
    channel: &str,
    event: &TrackingEvent,
) -> Result<usize, PublishError> {
    let payload = event.to_wire()?;
    Ok(bus.publish(channel, Bytes::from(payload)).await?)
}
