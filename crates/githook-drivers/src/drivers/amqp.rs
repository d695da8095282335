use async_trait::async_trait;
use githook_core::{Ctx, Error, Event, Result};
use lapin::options::{BasicPublishOptions, ExchangeDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind};

use crate::config::AmqpConfig;
use crate::publisher::{Publisher, PublishEnvelope};

pub struct AmqpPublisher {
    _connection: Connection,
    channel: Channel,
    exchange: String,
    routing_key_template: Option<String>,
    mandatory: bool,
    immediate: bool,
}

impl AmqpPublisher {
    pub async fn connect(cfg: &AmqpConfig) -> Result<Self> {
        let connection = Connection::connect(&cfg.url, ConnectionProperties::default())
            .await
            .map_err(|e| Error::FailedPrecondition(format!("amqp connect failed: {e}")))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(|e| Error::FailedPrecondition(format!("amqp channel open failed: {e}")))?;
        let exchange = cfg.exchange.clone().unwrap_or_else(|| "githook.events".to_string());
        channel
            .exchange_declare(
                &exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..ExchangeDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| Error::FailedPrecondition(format!("amqp exchange declare failed: {e}")))?;
        Ok(Self {
            _connection: connection,
            channel,
            exchange,
            routing_key_template: cfg.routing_key_template.clone(),
            mandatory: cfg.mandatory,
            immediate: cfg.immediate,
        })
    }

    fn routing_key(&self, topic: &str) -> String {
        match &self.routing_key_template {
            Some(template) => template.replace("{topic}", topic),
            None => topic.to_string(),
        }
    }
}

#[async_trait]
impl Publisher for AmqpPublisher {
    async fn publish(&self, ctx: &Ctx, topic: &str, event: &Event) -> Result<()> {
        let envelope = PublishEnvelope::new(topic, event);
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| Error::PublishFailed(format!("amqp envelope encode failed: {e}")))?;
        let routing_key = self.routing_key(topic);
        ctx.run(self.channel.basic_publish(
            &self.exchange,
            &routing_key,
            BasicPublishOptions {
                mandatory: self.mandatory,
                immediate: self.immediate,
            },
            &body,
            BasicProperties::default().with_content_type("application/json".into()),
        ))
        .await?
        .map_err(|e| Error::PublishFailed(format!("amqp publish failed: {e}")))?;
        Ok(())
    }

    async fn close(&self, ctx: &Ctx) -> Result<()> {
        if let Err(e) = ctx.run(self.channel.close(200, "closing")).await? {
            tracing::debug!(error = %e, "amqp channel close reported an error");
        }
        Ok(())
    }
}
