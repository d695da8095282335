use async_trait::async_trait;
use githook_core::{Ctx, Error, Event, Result};

use crate::config::NatsConfig;
use crate::publisher::{Publisher, PublishEnvelope};

pub struct NatsPublisher {
    client: async_nats::Client,
    subject_prefix: Option<String>,
}

impl NatsPublisher {
    pub async fn connect(cfg: &NatsConfig) -> Result<Self> {
        let client = async_nats::connect(&cfg.url)
            .await
            .map_err(|e| Error::FailedPrecondition(format!("nats connect failed: {e}")))?;
        Ok(Self {
            client,
            subject_prefix: cfg.subject_prefix.clone(),
        })
    }

    fn subject(&self, topic: &str) -> String {
        match &self.subject_prefix {
            Some(prefix) => format!("{prefix}.{topic}"),
            None => topic.to_string(),
        }
    }
}

#[async_trait]
impl Publisher for NatsPublisher {
    async fn publish(&self, ctx: &Ctx, topic: &str, event: &Event) -> Result<()> {
        let envelope = PublishEnvelope::new(topic, event);
        let body = serde_json::to_vec(&envelope)
            .map_err(|e| Error::PublishFailed(format!("nats envelope encode failed: {e}")))?;
        let subject = self.subject(topic);
        ctx.run(self.client.publish(subject, body.into()))
            .await?
            .map_err(|e| Error::PublishFailed(format!("nats publish failed: {e}")))?;
        ctx.run(self.client.flush())
            .await?
            .map_err(|e| Error::PublishFailed(format!("nats flush failed: {e}")))?;
        Ok(())
    }

    async fn close(&self, _ctx: &Ctx) -> Result<()> {
        Ok(())
    }
}
