use rdkafka::config::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum PublisherError {
    #[error("Failed to create Kafka producer: {0}")]
    ProducerCreation(#[from] KafkaError),

    #[error("Failed to serialize message: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish message with key {key}: {source}")]
    PublishFailed {
        key: String,
        #[source]
        source: KafkaError,
    },
}

/// Kafka publisher for JSON messages keyed by a string id.
///
/// The producer runs with idempotence on, so broker-side retries can
/// neither duplicate nor reorder messages that share a key.
pub struct EventPublisher {
    producer: FutureProducer,
    topic: String,
}

impl EventPublisher {
    /// Create a new EventPublisher
    ///
    /// # Example
    /// ```no_run
    /// use messaging::EventPublisher;
    ///
    /// let publisher = EventPublisher::new("localhost:9092", "orders".to_string())
    ///     .expect("Failed to create publisher");
    /// ```
    pub fn new(brokers: &str, topic: String) -> Result<Self, PublisherError> {
        info!(brokers = %brokers, topic = %topic, "Creating Kafka producer");

        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("retries", "3")
            .create()?;

        Ok(Self { producer, topic })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Publish a message as JSON.
    ///
    /// `key` picks the partition, so every message for one order lands on
    /// the same partition and keeps its order.
    pub async fn publish<T: Serialize>(&self, key: &str, message: &T) -> Result<(), PublisherError> {
        let payload = encode(message)?;
        let record = FutureRecord::to(&self.topic).key(key).payload(&payload);

        match self
            .producer
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
        {
            Ok((partition, offset)) => {
                debug!(
                    topic = %self.topic,
                    key = %key,
                    partition,
                    offset,
                    bytes = payload.len(),
                    "Message published"
                );
                Ok(())
            }
            Err((source, _)) => {
                warn!(key = %key, error = %source, "Failed to publish message");
                Err(PublisherError::PublishFailed {
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Publish several messages in order, stopping at the first failure
    pub async fn publish_batch<T: Serialize>(
        &self,
        messages: &[(String, T)],
    ) -> Result<(), PublisherError> {
        for (key, message) in messages {
            self.publish(key, message).await?;
        }
        info!(topic = %self.topic, count = messages.len(), "Batch published");
        Ok(())
    }
}

fn encode<T: Serialize>(message: &T) -> Result<Vec<u8>, PublisherError> {
    Ok(serde_json::to_vec(message)?)
}
