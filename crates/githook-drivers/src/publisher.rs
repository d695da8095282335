use async_trait::async_trait;
use githook_core::{Ctx, Event, Result};

/// A single broker binding capable of publishing an event to a named topic
/// (spec §4.4 "Publisher"). Implementations own their broker client for
/// their full lifetime; `close` must be idempotent.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, ctx: &Ctx, topic: &str, event: &Event) -> Result<()>;
    async fn close(&self, ctx: &Ctx) -> Result<()>;
}

/// The wire-level envelope published to every driver: the event's identity
/// plus either the transformed or original payload bytes (spec §4.3/§4.4).
#[derive(Debug, Clone, serde::Serialize)]
pub struct PublishEnvelope<'a> {
    pub topic: &'a str,
    pub provider: &'a str,
    pub name: &'a str,
    pub request_id: &'a str,
    pub tenant_id: &'a str,
    pub payload: &'a [u8],
}

impl<'a> PublishEnvelope<'a> {
    pub fn new(topic: &'a str, event: &'a Event) -> Self {
        Self {
            topic,
            provider: &event.provider,
            name: &event.name,
            request_id: &event.request_id,
            tenant_id: &event.tenant_id,
            payload: &event.raw_payload,
        }
    }
}
