//! Live fan-out of auction changes to every viewer.
//!
//! Writers publish through an [`EventPublisher`]. With a broker configured the
//! events travel through Kafka and a [`LiveRelay`] on every instance feeds them
//! into the local [`LiveFeed`]; without one the feed is the publisher. Each relay
//! joins its own consumer group so every instance sees every event.
// region:    --- Imports
use crate::auction::events::AuctionEvent;
use crate::auction::model::AuctionId;
use crate::message_broker::{KafkaConsumer, KafkaProducer};
use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Event Publisher
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String>;
}

// endregion: --- Event Publisher

// region:    --- Live Feed
/// In-process broadcast of auction events
#[derive(Clone)]
pub struct LiveFeed {
    sender: broadcast::Sender<AuctionEvent>,
}

impl Default for LiveFeed {
    fn default() -> Self {
        Self::new(256)
    }
}

impl LiveFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn send(&self, event: AuctionEvent) {
        let receivers = self.sender.send(event).unwrap_or(0);
        debug!("{:<12} --> delivered to {} viewers", "LiveFeed", receivers);
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<AuctionEvent> {
        self.sender.subscribe()
    }

    /// Events for one auction. Viewers that fall behind skip what they missed.
    pub fn watch(
        &self,
        auction_id: AuctionId,
    ) -> impl Stream<Item = AuctionEvent> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |message| match message {
            Ok(event) if event.auction_id() == auction_id => Some(event),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(
                    "{:<12} --> viewer of auction {} skipped {} events",
                    "LiveFeed", auction_id, skipped
                );
                None
            }
        })
    }
}

#[async_trait]
impl EventPublisher for LiveFeed {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String> {
        self.send(event.clone());
        Ok(())
    }
}

// endregion: --- Live Feed

// region:    --- Kafka Publisher
/// Publishes to the shared events topic, keyed by auction id so one auction's
/// events stay ordered within a partition.
pub struct KafkaEventPublisher {
    producer: KafkaProducer,
    topic: String,
}

impl KafkaEventPublisher {
    pub fn new(producer: KafkaProducer, topic: impl Into<String>) -> Self {
        Self {
            producer,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &AuctionEvent) -> Result<(), String> {
        self.producer
            .send_json(&self.topic, &event.auction_id().to_string(), event)
            .await
    }
}

// endregion: --- Kafka Publisher

// region:    --- Live Relay
/// Consumer group for one instance's relay: `prefix` plus a random suffix.
/// Sharing a group would split the partitions, and with them the events, between instances.
pub fn relay_group_id(prefix: &str) -> String {
    let mut suffix = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!("{}-{}", prefix, hex::encode(suffix))
}

/// Feeds broker events into this instance's [`LiveFeed`]
pub struct LiveRelay {
    feed: LiveFeed,
    consumer: KafkaConsumer,
    topic: String,
}

impl LiveRelay {
    pub fn new(feed: LiveFeed, consumer: KafkaConsumer, topic: impl Into<String>) -> Self {
        LiveRelay {
            feed,
            consumer,
            topic: topic.into(),
        }
    }

    pub async fn start(&self) {
        info!("{:<12} --> relaying topic {}", "LiveRelay", self.topic);
        let result = self
            .consumer
            .consume_json(&self.topic, |event: AuctionEvent| {
                debug!(
                    "{:<12} --> {} for auction {}",
                    "LiveRelay",
                    event.event_type(),
                    event.auction_id()
                );
                self.feed.send(event);
            })
            .await;
        if let Err(e) = result {
            error!("{:<12} --> relay stopped: {}", "LiveRelay", e);
        }
    }
}

// endregion: --- Live Relay

// endregion: --- Tests
