//! In-process bus backed by `tokio::sync::broadcast`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

use crate::{Bus, BusError, BusMessage, BusResult, Subscription};

const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// In-memory bus for tests and single-process deployments.
///
/// Each channel is a broadcast channel created on first use. A subscriber
/// that falls more than `capacity` messages behind loses the overflow.
#[derive(Debug)]
pub struct LocalBus {
    channels: RwLock<HashMap<String, broadcast::Sender<BusMessage>>>,
    capacity: usize,
    offline: AtomicBool,
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl LocalBus {
    /// Creates a bus with the default per-channel capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus whose channels buffer up to `capacity` messages per
    /// subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            offline: AtomicBool::new(false),
        }
    }

    /// Marks the bus reachable or unreachable.
    ///
    /// While offline every operation fails with [`BusError::Transport`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Drops `channel`, ending every live subscription to it.
    pub fn close_channel(&self, channel: &str) {
        self.channels_mut().remove(channel);
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: &str) -> usize {
        let channels = match self.channels.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        channels
            .get(channel)
            .map(broadcast::Sender::receiver_count)
            .unwrap_or(0)
    }

    fn channels_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, broadcast::Sender<BusMessage>>> {
        match self.channels.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("local bus lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<BusMessage> {
        self.channels_mut()
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn check_online(&self) -> BusResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BusError::Transport("bus is offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Bus for LocalBus {
    async fn ping(&self) -> BusResult<()> {
        self.check_online()
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> BusResult<usize> {
        self.check_online()?;
        let message = BusMessage {
            channel: channel.to_string(),
            payload,
        };
        // No subscribers is not a failure: the message is simply not delivered.
        Ok(self.sender_for(channel).send(message).unwrap_or(0))
    }

    async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
        self.check_online()?;
        let rx = self.sender_for(channel).subscribe();
        let name = channel.to_string();

        let messages = BroadcastStream::new(rx).filter_map(move |result| match result {
            Ok(message) => Some(message),
            Err(lagged) => {
                tracing::warn!(
                    channel = %name,
                    error = %lagged,
                    "subscriber lagged; messages were dropped"
                );
                None
            }
        });

        Ok(Subscription::new(channel, messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn local_bus_round_trip() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe("tracking-events").await.expect("subscribe ok");

        let receivers = bus
            .publish("tracking-events", Bytes::from_static(b"ping"))
            .await
            .expect("publish ok");
        assert_eq!(receivers, 1);

        let msg = sub.next().await.expect("receive ok");
        assert_eq!(msg.channel, "tracking-events");
        assert_eq!(msg.payload, Bytes::from_static(b"ping"));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_not_an_error() {
        let bus = LocalBus::new();
        let receivers = bus
            .publish("nobody-listens", Bytes::from_static(b"x"))
            .await
            .expect("publish ok");
        assert_eq!(receivers, 0);
    }

    #[tokio::test]
    async fn messages_before_subscribe_are_not_replayed() {
        let bus = LocalBus::new();
        bus.publish("c", Bytes::from_static(b"early")).await.unwrap();

        let mut sub = bus.subscribe("c").await.unwrap();
        bus.publish("c", Bytes::from_static(b"late")).await.unwrap();

        assert_eq!(sub.next().await.unwrap().payload, Bytes::from_static(b"late"));
    }

    #[tokio::test]
    async fn channels_are_isolated() {
        let bus = LocalBus::new();
        let mut a = bus.subscribe("a").await.unwrap();
        let _b = bus.subscribe("b").await.unwrap();

        bus.publish("b", Bytes::from_static(b"for-b")).await.unwrap();
        bus.publish("a", Bytes::from_static(b"for-a")).await.unwrap();

        assert_eq!(a.next().await.unwrap().payload, Bytes::from_static(b"for-a"));
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_overflow() {
        let bus = LocalBus::with_capacity(2);
        let mut sub = bus.subscribe("c").await.unwrap();

        for i in 0..5u8 {
            bus.publish("c", Bytes::from(vec![i])).await.unwrap();
        }

        // Only the newest `capacity` messages survive.
        assert_eq!(sub.next().await.unwrap().payload, Bytes::from(vec![3u8]));
        assert_eq!(sub.next().await.unwrap().payload, Bytes::from(vec![4u8]));
    }

    #[tokio::test]
    async fn closing_channel_ends_subscription() {
        let bus = LocalBus::new();
        let mut sub = bus.subscribe("c").await.unwrap();
        assert_eq!(bus.subscriber_count("c"), 1);

        bus.close_channel("c");
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn offline_bus_rejects_operations() {
        let bus = LocalBus::new();
        bus.set_offline(true);

        assert!(matches!(bus.ping().await, Err(BusError::Transport(_))));
        assert!(bus.subscribe("c").await.is_err());
        assert!(bus.publish("c", Bytes::new()).await.is_err());
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let bus = LocalBus::new();
        let sub = bus.subscribe("c").await.unwrap();
        assert_eq!(bus.subscriber_count("c"), 1);

        sub.close();
        assert_eq!(bus.subscriber_count("c"), 0);
    }
}
