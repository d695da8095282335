#![cfg(feature = "kafka-producer")]

use std::time::Duration;

use async_trait::async_trait;
use githook_core::{Ctx, Error, Event, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::config::KafkaConfig;
use crate::publisher::{Publisher, PublishEnvelope};

pub struct KafkaPublisher {
    producer: FutureProducer,
    topic_prefix: Option<String>,
}

impl KafkaPublisher {
    pub fn connect(cfg: &KafkaConfig) -> Result<Self> {
        let brokers = match (&cfg.brokers, &cfg.broker) {
            (Some(list), _) if !list.is_empty() => list.join(","),
            (_, Some(single)) => single.clone(),
            _ => {
                return Err(Error::FailedPrecondition(
                    "kafka driver requires brokers[] or broker".into(),
                ))
            }
        };
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| Error::FailedPrecondition(format!("kafka producer create failed: {e}")))?;
        Ok(Self {
            producer,
            topic_prefix: cfg.topic_prefix.clone(),
        })
    }

    fn topic(&self, topic: &str) -> String {
        match &self.topic_prefix {
            Some(prefix) => format!("{prefix}{topic}"),
            None => topic.to_string(),
        }
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&self, ctx: &Ctx, topic: &str, event: &Event) -> Result<()> {
        let envelope = PublishEnvelope::new(topic, event);
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| Error::PublishFailed(format!("kafka envelope encode failed: {e}")))?;
        let full_topic = self.topic(topic);
        let key = event.request_id.clone();
        let record = FutureRecord::to(&full_topic).payload(&body).key(&key);
        ctx.run(self.producer.send(record, Duration::from_secs(5)))
            .await?
            .map_err(|(e, _)| Error::PublishFailed(format!("kafka publish failed: {e}")))?;
        Ok(())
    }

    async fn close(&self, _ctx: &Ctx) -> Result<()> {
        Ok(())
    }
}
