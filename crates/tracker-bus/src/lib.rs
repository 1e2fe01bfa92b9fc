//! Named-channel publish/subscribe transport.
//!
//! The [`Bus`] trait is the only thing the rest of the pipeline knows about
//! the transport. Delivery is at-most-once with no persistence or replay:
//! a message published while nobody is subscribed is gone.
//!
//! Implementations:
//!
//! - [`LocalBus`]: in-process `tokio::sync::broadcast` channels.
//! - [`RedisBus`]: Redis `PUBLISH`/`SUBSCRIBE`.

mod local;
mod redis_bus;

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use thiserror::Error;

pub use local::LocalBus;
pub use redis_bus::RedisBus;

/// A message received from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// The channel the message was published on.
    pub channel: String,
    /// The raw message body.
    pub payload: Bytes,
}

/// Errors produced by bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The channel or connection has been closed.
    #[error("bus channel closed")]
    Closed,
    /// The transport failed for a reason other than Redis itself.
    #[error("bus transport error: {0}")]
    Transport(String),
    /// A Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Result alias for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// A named-channel publish/subscribe transport.
#[async_trait]
pub trait Bus: Send + Sync {
    /// Checks that the transport is reachable.
    async fn ping(&self) -> BusResult<()>;

    /// Publishes `payload` on `channel`.
    ///
    /// Returns the number of subscribers the transport reports delivering
    /// to. Zero receivers is not an error.
    async fn publish(&self, channel: &str, payload: Bytes) -> BusResult<usize>;

    /// Subscribes to `channel`.
    ///
    /// Resolves only once the subscription is active, so messages published
    /// after this returns are delivered to it.
    async fn subscribe(&self, channel: &str) -> BusResult<Subscription>;
}

type MessageStream = Pin<Box<dyn Stream<Item = BusMessage> + Send>>;

/// A live subscription to one channel.
///
/// Dropping or [closing](Subscription::close) the subscription unsubscribes.
pub struct Subscription {
    channel: String,
    messages: MessageStream,
}

impl Subscription {
    /// Wraps a message stream for `channel`.
    pub fn new<S>(channel: impl Into<String>, messages: S) -> Self
    where
        S: Stream<Item = BusMessage> + Send + 'static,
    {
        Self {
            channel: channel.into(),
            messages: Box::pin(messages),
        }
    }

    /// The subscribed channel name.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the underlying transport has closed the
    /// subscription. Cancel-safe: dropping the future loses no message.
    pub async fn next(&mut self) -> Option<BusMessage> {
        self.messages.next().await
    }

    /// Closes the subscription, discarding anything still buffered.
    pub fn close(self) {
        tracing::debug!(channel = %self.channel, "closing subscription");
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .finish_non_exhaustive()
    }
}
