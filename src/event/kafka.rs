//! Broker transport on librdkafka (feature `kafka`)

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::Message;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};
use tokio::sync::OnceCell;

use super::channel::{Delivery, EventPublisher, EventSource};
use super::error::EventError;

fn transport(e: KafkaError) -> EventError {
    EventError::Transport(e.to_string())
}

/// Offset list that acknowledges `delivery` and everything before it on its partition
fn commit_position(topic: &str, delivery: &Delivery) -> Result<TopicPartitionList, EventError> {
    let mut tpl = TopicPartitionList::new();
    tpl.add_partition_offset(topic, delivery.partition, Offset::Offset(delivery.offset + 1))
        .map_err(transport)?;
    Ok(tpl)
}

/// Producer and topic administration for one topic
pub struct KafkaEventChannel {
    brokers: String,
    topic: String,
    partitions: i32,
    producer: FutureProducer,
    topic_ready: OnceCell<()>,
}

impl KafkaEventChannel {
    pub fn new(brokers: &str, topic: &str, partitions: i32, send_retries: u32) -> Result<Self, EventError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("message.send.max.retries", send_retries.to_string())
            .create()
            .map_err(transport)?;

        Ok(Self {
            brokers: brokers.to_string(),
            topic: topic.to_string(),
            partitions: partitions.max(1),
            producer,
            topic_ready: OnceCell::new(),
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Join `group` on this topic. Partitions are assigned by the broker.
    pub fn subscribe(&self, group: &str) -> Result<KafkaSubscription, EventError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000")
            .create()
            .map_err(transport)?;

        consumer.subscribe(&[&self.topic]).map_err(transport)?;
        tracing::info!(topic = %self.topic, group, "Kafka consumer subscribed");

        Ok(KafkaSubscription {
            consumer,
            topic: self.topic.clone(),
        })
    }

    async fn create_topic(&self) -> Result<(), EventError> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .create()
            .map_err(transport)?;

        let topic = NewTopic::new(&self.topic, self.partitions, TopicReplication::Fixed(1));
        let results = admin
            .create_topics(&[topic], &AdminOptions::new())
            .await
            .map_err(transport)?;

        for result in results {
            match result {
                Ok(name) => tracing::info!(topic = %name, "Topic created"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::debug!(topic = %name, "Topic already exists")
                }
                Err((name, code)) => {
                    return Err(EventError::Transport(format!(
                        "create topic {} failed: {}",
                        name, code
                    )));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for KafkaEventChannel {
    async fn ensure_topic(&self) -> Result<(), EventError> {
        self.topic_ready
            .get_or_try_init(|| self.create_topic())
            .await
            .map(|_| ())
    }

    async fn publish(&self, key: &str, payload: &[u8]) -> Result<(), EventError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map(|_| ())
            .map_err(|(e, _)| transport(e))
    }
}

pub struct KafkaSubscription {
    consumer: StreamConsumer,
    topic: String,
}

#[async_trait]
impl EventSource for KafkaSubscription {
    async fn fetch(&mut self) -> Result<Option<Delivery>, EventError> {
        let message = self.consumer.recv().await.map_err(transport)?;
        Ok(Some(Delivery {
            partition: message.partition(),
            offset: message.offset(),
            key: message.key().map(|k| String::from_utf8_lossy(k).into_owned()),
            payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        }))
    }

    /// Queues the offset commit without waiting on the broker round trip.
    /// A commit lost to a crash means one redelivery, absorbed by the idempotency key.
    async fn commit(&mut self, delivery: &Delivery) -> Result<(), EventError> {
        let tpl = commit_position(&self.topic, delivery)?;
        self.consumer
            .commit(&tpl, CommitMode::Async)
            .map_err(transport)
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "Kafka consumer unsubscribed");
    }
}
