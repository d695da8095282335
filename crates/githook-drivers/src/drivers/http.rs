use async_trait::async_trait;
use githook_core::{Ctx, Error, Event, Result};
use reqwest::Client;

use crate::config::{resolve_http_endpoint, HttpConfig};
use crate::publisher::{Publisher, PublishEnvelope};

pub struct HttpPublisher {
    client: Client,
    endpoint_template: String,
    webhook_token: Option<String>,
}

impl HttpPublisher {
    pub fn new(cfg: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::FailedPrecondition(format!("http client build failed: {e}")))?;
        Ok(Self {
            client,
            endpoint_template: cfg.endpoint.clone(),
            webhook_token: cfg.webhook_token.clone(),
        })
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish(&self, ctx: &Ctx, topic: &str, event: &Event) -> Result<()> {
        let envelope = PublishEnvelope::new(topic, event);
        let endpoint = resolve_http_endpoint(&self.endpoint_template, topic);
        let mut request = self.client.post(&endpoint).json(&envelope);
        if let Some(token) = &self.webhook_token {
            request = request.bearer_auth(token);
        }
        let response = ctx
            .run(request.send())
            .await?
            .map_err(|e| Error::PublishFailed(format!("http sink request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(Error::PublishFailed(format!(
                "http sink returned status {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn close(&self, _ctx: &Ctx) -> Result<()> {
        Ok(())
    }
}
