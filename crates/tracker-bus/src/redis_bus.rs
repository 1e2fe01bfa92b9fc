//! Redis pub/sub transport.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::{Bus, BusMessage, BusResult, Subscription};

/// Redis-backed bus.
///
/// Publishing and `PING` share one multiplexed connection; each subscription
/// opens its own dedicated pub/sub connection.
#[derive(Clone)]
pub struct RedisBus {
    client: redis::Client,
    conn: ConnectionManager,
}

impl RedisBus {
    /// Opens a connection to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Redis`](crate::BusError::Redis) if the URL is
    /// invalid or the server cannot be reached.
    pub async fn connect(url: &str) -> BusResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, conn })
    }
}

#[async_trait]
impl Bus for RedisBus {
    async fn ping(&self) -> BusResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Bytes) -> BusResult<usize> {
        let mut conn = self.conn.clone();
        let receivers: usize = conn.publish(channel, &payload[..]).await?;
        Ok(receivers)
    }

    async fn subscribe(&self, channel: &str) -> BusResult<Subscription> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        // Resolves once the server has confirmed the subscription.
        pubsub.subscribe(channel).await?;
        tracing::debug!(channel, "redis subscription confirmed");

        let messages = pubsub.into_on_message().map(|msg| BusMessage {
            channel: msg.get_channel_name().to_string(),
            payload: Bytes::copy_from_slice(msg.get_payload_bytes()),
        });

        Ok(Subscription::new(channel, messages))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BusError;

    #[tokio::test]
    async fn invalid_url_fails_before_connecting() {
        let err = RedisBus::connect("not a redis url").await.err().expect("should fail");
        assert!(matches!(err, BusError::Redis(_)));
    }
}
