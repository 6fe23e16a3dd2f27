//! Kafka plumbing for the live event relay
// region:    --- Imports
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::RDKafkaErrorCode;
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

// endregion: --- Imports

// region:    --- Kafka Producer
pub struct KafkaProducer {
    producer: FutureProducer,
}

impl KafkaProducer {
    pub fn new(brokers: &str) -> Result<Self, String> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| format!("producer creation error: {:?}", e))?;
        Ok(Self { producer })
    }

    /// Sends `value` as JSON under `key`. Messages sharing a key stay in order.
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(), String> {
        let payload = serde_json::to_vec(value).map_err(|e| e.to_string())?;
        debug!("{:<12} --> {} bytes to {} key={}", "Producer", payload.len(), topic, key);

        self.producer
            .send(
                FutureRecord::to(topic).key(key).payload(&payload),
                Duration::from_secs(0),
            )
            .await
            .map(|_| ())
            .map_err(|(e, _)| format!("error sending message: {:?}", e))
    }
}

// endregion: --- Kafka Producer

// region:    --- Kafka Consumer
pub struct KafkaConsumer {
    consumer: StreamConsumer,
}

impl KafkaConsumer {
    /// Starts from the latest offset: only messages produced after joining are seen.
    pub fn new(brokers: &str, group_id: &str) -> Result<Self, String> {
        let consumer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(|e| format!("consumer creation error: {:?}", e))?;
        Ok(Self { consumer })
    }

    /// Decodes every message on `topic` as JSON and hands it to `handler`.
    /// Undecodable messages are logged and skipped.
    pub async fn consume_json<T, F>(&self, topic: &str, mut handler: F) -> Result<(), String>
    where
        T: DeserializeOwned,
        F: FnMut(T),
    {
        self.consumer.subscribe(&[topic]).map_err(|e| e.to_string())?;
        info!("{:<12} --> subscribed to {}", "Consumer", topic);

        let mut messages = self.consumer.stream();
        while let Some(received) = messages.next().await {
            let message = match received {
                Ok(message) => message,
                Err(e) => {
                    error!("{:<12} --> receive error: {:?}", "Consumer", e);
                    continue;
                }
            };
            let Some(payload) = message.payload() else {
                warn!(
                    "{:<12} --> empty payload at {}/{}",
                    "Consumer",
                    message.partition(),
                    message.offset()
                );
                continue;
            };
            match serde_json::from_slice::<T>(payload) {
                Ok(value) => handler(value),
                Err(e) => error!(
                    "{:<12} --> undecodable message at {}/{}: {}",
                    "Consumer",
                    message.partition(),
                    message.offset(),
                    e
                ),
            }
        }
        Err(format!("stream for {} ended", topic))
    }
}

// endregion: --- Kafka Consumer

// region:    --- Kafka Manager
/// Builds clients against one broker list
pub struct KafkaManager {
    brokers: String,
}

impl KafkaManager {
    pub fn new(brokers: &str) -> Self {
        Self {
            brokers: brokers.to_string(),
        }
    }

    pub fn producer(&self) -> Result<KafkaProducer, String> {
        KafkaProducer::new(&self.brokers)
    }

    pub fn consumer(&self, group_id: &str) -> Result<KafkaConsumer, String> {
        KafkaConsumer::new(&self.brokers, group_id)
    }

    /// Creates `topic` unless it already exists. Also fails when the broker is unreachable.
    pub async fn ensure_topic(
        &self,
        topic: &str,
        partitions: i32,
        replication: i32,
    ) -> Result<(), String> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(|e| format!("admin client creation failed: {:?}", e))?;

        let new_topic = NewTopic::new(topic, partitions, TopicReplication::Fixed(replication));
        let options = AdminOptions::new().operation_timeout(Some(Duration::from_secs(10)));
        let results = admin
            .create_topics(&[new_topic], &options)
            .await
            .map_err(|e| format!("topic creation failed: {:?}", e))?;

        for result in results {
            match result {
                Ok(name) => info!("{:<12} --> created topic {}", "Kafka", name),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    debug!("{:<12} --> topic {} already exists", "Kafka", name)
                }
                Err((name, code)) => return Err(format!("topic {} not created: {}", name, code)),
            }
        }
        Ok(())
    }
}

// endregion: --- Kafka Manager
