//! The consume loop: subscribe, filter, display, until cancelled.
//!
//! A subscriber moves through `Connecting → Subscribed → Listening →
//! Terminating`. Each received message is filtered and displayed to
//! completion before the loop looks at the cancellation token again, so
//! cancellation never interrupts a message mid-flight. Messages still
//! buffered when cancellation is observed are discarded.

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracker_bus::{Bus, BusError, Subscription};

use crate::display::EventSink;
use crate::filter::{Decision, FilterDedupe};

/// Lifecycle states of a [`Subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    /// Opening the channel subscription.
    Connecting,
    /// The subscription is confirmed; not yet consuming.
    Subscribed,
    /// Consuming messages.
    Listening,
    /// Closing the subscription. Terminal.
    Terminating,
}

/// Errors that end a subscriber.
#[derive(Debug, Error)]
pub enum SubscriberError {
    /// The subscription could not be opened.
    #[error("failed to subscribe to '{channel}': {source}")]
    Subscribe {
        /// Channel that was requested.
        channel: String,
        /// Underlying transport error.
        source: BusError,
    },

    /// The transport closed the subscription while listening.
    #[error("subscription to '{0}' closed by the transport")]
    StreamClosed(String),
}

/// Counters for one run of the consume loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Messages taken off the subscription.
    pub received: u64,
    /// Messages that reached the sink.
    pub displayed: u64,
    /// Messages the filter dropped.
    pub dropped: u64,
}

/// A live subscription driving one [`FilterDedupe`] and one sink.
#[derive(Debug)]
pub struct Subscriber {
    subscription: Subscription,
    state: SubscriberState,
}

impl Subscriber {
    /// Subscribes to `channel` on `bus`.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::Subscribe`] if the bus refuses the
    /// subscription. There is no retry.
    pub async fn connect(bus: &dyn Bus, channel: &str) -> Result<Self, SubscriberError> {
        tracing::debug!(channel, state = ?SubscriberState::Connecting, "subscribing");
        let subscription =
            bus.subscribe(channel)
                .await
                .map_err(|source| SubscriberError::Subscribe {
                    channel: channel.to_string(),
                    source,
                })?;
        tracing::info!(channel, "subscription confirmed");

        Ok(Self {
            subscription,
            state: SubscriberState::Subscribed,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubscriberState {
        self.state
    }

    /// Consumes messages until `cancel` fires, then closes the subscription.
    ///
    /// # Errors
    ///
    /// Returns [`SubscriberError::StreamClosed`] if the transport ends the
    /// subscription before cancellation. Lost connectivity is not recovered.
    pub async fn run<S: EventSink>(
        mut self,
        filter: &mut FilterDedupe,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> Result<RunSummary, SubscriberError> {
        self.state = SubscriberState::Listening;
        let channel = self.subscription.channel().to_string();
        tracing::info!(%channel, "listening for events");

        let mut summary = RunSummary::default();

        loop {
            let message = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = self.subscription.next() => message,
            };

            let Some(message) = message else {
                tracing::error!(%channel, "subscription closed by the transport");
                return Err(SubscriberError::StreamClosed(channel));
            };

            summary.received += 1;
            match filter.admit(&message.payload) {
                Decision::Display(event) => {
                    sink.display(&event);
                    summary.displayed += 1;
                }
                Decision::Drop(reason) => {
                    tracing::trace!(?reason, "message dropped");
                    summary.dropped += 1;
                }
            }
        }

        self.state = SubscriberState::Terminating;
        tracing::info!(
            %channel,
            received = summary.received,
            displayed = summary.displayed,
            dropped = summary.dropped,
            "terminating subscriber"
        );
        self.subscription.close();
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tracker_bus::LocalBus;
    use tracker_types::TrackingEvent;

    #[tokio::test]
    async fn connect_reports_subscribed_state() {
        let bus = LocalBus::new();
        let subscriber = Subscriber::connect(&bus, "c").await.unwrap();
        assert_eq!(subscriber.state(), SubscriberState::Subscribed);
        assert_eq!(bus.subscriber_count("c"), 1);
    }

    #[tokio::test]
    async fn connect_failure_is_returned() {
        let bus = LocalBus::new();
        bus.set_offline(true);
        let err = Subscriber::connect(&bus, "c").await.unwrap_err();
        assert!(matches!(err, SubscriberError::Subscribe { ref channel, .. } if channel == "c"));
    }

    #[tokio::test]
    async fn cancelled_before_any_message_exits_cleanly() {
        let bus = LocalBus::new();
        let subscriber = Subscriber::connect(&bus, "c").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut sink: Vec<TrackingEvent> = Vec::new();
        let summary = subscriber
            .run(&mut FilterDedupe::default(), &mut sink, cancel)
            .await
            .unwrap();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(bus.subscriber_count("c"), 0, "subscription should be closed");
    }

    #[tokio::test]
    async fn buffered_messages_are_discarded_after_cancellation() {
        let bus = LocalBus::new();
        let subscriber = Subscriber::connect(&bus, "c").await.unwrap();
        let payload = TrackingEvent::new("1", 1, "x").to_wire().unwrap();
        bus.publish("c", Bytes::from(payload)).await.unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink: Vec<TrackingEvent> = Vec::new();
        let summary = subscriber
            .run(&mut FilterDedupe::default(), &mut sink, cancel)
            .await
            .unwrap();

        assert_eq!(summary.received, 0);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn transport_close_is_an_error() {
        let bus = LocalBus::new();
        let subscriber = Subscriber::connect(&bus, "c").await.unwrap();
        bus.close_channel("c");

        let mut sink: Vec<TrackingEvent> = Vec::new();
        let err = subscriber
            .run(&mut FilterDedupe::default(), &mut sink, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubscriberError::StreamClosed(ref c) if c == "c"));
    }
}
