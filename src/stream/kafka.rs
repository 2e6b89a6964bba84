use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::stream::source::StreamSource;
use crate::types::StreamMessage;

/// Consumer-group reader over the sale topic.
///
/// Offsets are committed automatically in the background once a message has been
/// handed to the engine: delivery is at-least-once and a crash can replay messages.
pub struct KafkaSource {
    consumer: StreamConsumer,
    brokers: String,
    topic: String,
    group: String,
}

impl KafkaSource {
    pub fn connect(cfg: &Config) -> Result<Self> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &cfg.kafka_brokers)
            .set("group.id", &cfg.kafka_group)
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", &cfg.kafka_offset_reset)
            .create()?;
        consumer.subscribe(&[cfg.kafka_topic.as_str()])?;
        info!(
            brokers = %cfg.kafka_brokers,
            topic = %cfg.kafka_topic,
            group = %cfg.kafka_group,
            "Kafka consumer subscribed"
        );
        Ok(Self {
            consumer,
            brokers: cfg.kafka_brokers.clone(),
            topic: cfg.kafka_topic.clone(),
            group: cfg.kafka_group.clone(),
        })
    }
}

#[async_trait]
impl StreamSource for KafkaSource {
    async fn next_message(&mut self) -> Result<StreamMessage> {
        let msg = self.consumer.recv().await?;
        Ok(StreamMessage {
            topic: msg.topic().to_string(),
            partition: msg.partition(),
            offset: msg.offset(),
            payload: msg.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            timestamp_ms: msg.timestamp().to_millis(),
        })
    }

    fn describe(&self) -> String {
        format!("kafka brokers={} topic={} group={}", self.brokers, self.topic, self.group)
    }
}
