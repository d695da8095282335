use std::collections::HashMap;
use std::sync::Arc;

use githook_core::{Ctx, Error, Event, Result};
use tracing::warn;

use crate::publisher::Publisher;

/// Fans a publish call out to named drivers, with per-target DLQ mirroring
/// on failure (spec §4.4 "Publisher mux").
pub struct PublisherMux {
    publishers: HashMap<String, Arc<dyn Publisher>>,
    default_drivers: Vec<String>,
    dlq_driver: Option<String>,
}

impl PublisherMux {
    pub fn new(
        publishers: HashMap<String, Arc<dyn Publisher>>,
        default_drivers: Vec<String>,
        dlq_driver: Option<String>,
    ) -> Result<Self> {
        if publishers.is_empty() {
            return Err(Error::NoPublishersAvailable);
        }
        Ok(Self {
            publishers,
            default_drivers,
            dlq_driver,
        })
    }

    pub fn default_drivers(&self) -> &[String] {
        &self.default_drivers
    }

    /// Publish to the mux's configured default drivers.
    pub async fn publish(&self, ctx: &Ctx, topic: &str, event: &Event) -> Result<()> {
        let targets = self.default_drivers.clone();
        self.publish_for_drivers(ctx, topic, event, &targets).await
    }

    /// Publish to an explicit driver subset (spec §4.3 dispatch pipeline
    /// step "publish via tenant mux with PublishForDrivers(topic, event,
    /// [driver_name])").
    pub async fn publish_for_drivers(
        &self,
        ctx: &Ctx,
        topic: &str,
        event: &Event,
        targets: &[String],
    ) -> Result<()> {
        let mut errors = Vec::new();
        for target in targets {
            let Some(publisher) = self.publishers.get(target) else {
                errors.push(Error::UnknownDriver(target.clone()).to_string());
                continue;
            };
            if let Err(err) = publisher.publish(ctx, topic, event).await {
                errors.push(format!("{target}: {err}"));
                self.mirror_to_dlq(ctx, target, topic, event).await;
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::PublishFailed(errors.join("; ")))
        }
    }

    /// Best-effort DLQ mirror for a failing target, skipped when no DLQ is
    /// configured or the DLQ is itself the failing driver (spec §8 property
    /// 4).
    async fn mirror_to_dlq(&self, ctx: &Ctx, failing_target: &str, topic: &str, event: &Event) {
        let Some(dlq) = &self.dlq_driver else { return };
        if dlq == failing_target {
            return;
        }
        let Some(publisher) = self.publishers.get(dlq) else {
            warn!(dlq, "configured dlq driver has no publisher in this mux");
            return;
        };
        if let Err(err) = publisher.publish(ctx, topic, event).await {
            warn!(dlq, error = %err, "dlq mirror publish also failed");
        }
    }

    /// Close every underlying publisher, joining their errors.
    pub async fn close(&self, ctx: &Ctx) -> Result<()> {
        let mut errors = Vec::new();
        for (name, publisher) in &self.publishers {
            if let Err(err) = publisher.close(ctx).await {
                errors.push(format!("{name}: {err}"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::PublishFailed(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use githook_core::event::HeaderMultimap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingPublisher {
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, _ctx: &Ctx, _topic: &str, _event: &Event) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::PublishFailed("boom".into()))
            } else {
                Ok(())
            }
        }

        async fn close(&self, _ctx: &Ctx) -> Result<()> {
            Ok(())
        }
    }

    fn event() -> Event {
        Event::new("github", "pull_request", "r1", "acme", b"{}".to_vec(), HeaderMultimap::new())
    }

    #[tokio::test]
    async fn failed_publish_is_mirrored_to_distinct_dlq_exactly_once() {
        let amqp_calls = Arc::new(AtomicUsize::new(0));
        let dlq_calls = Arc::new(AtomicUsize::new(0));
        let mut publishers: HashMap<String, Arc<dyn Publisher>> = HashMap::new();
        publishers.insert(
            "amqp".into(),
            Arc::new(RecordingPublisher {
                fail: true,
                calls: amqp_calls.clone(),
            }),
        );
        publishers.insert(
            "dlq".into(),
            Arc::new(RecordingPublisher {
                fail: false,
                calls: dlq_calls.clone(),
            }),
        );
        let mux = PublisherMux::new(publishers, vec!["amqp".into()], Some("dlq".into())).unwrap();
        let ctx = Ctx::background();
        let result = mux.publish(&ctx, "pr.opened", &event()).await;
        assert!(result.is_err());
        assert_eq!(amqp_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dlq_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_target_driver_is_reported() {
        let mut publishers: HashMap<String, Arc<dyn Publisher>> = HashMap::new();
        publishers.insert(
            "amqp".into(),
            Arc::new(RecordingPublisher {
                fail: false,
                calls: Arc::new(AtomicUsize::new(0)),
            }),
        );
        let mux = PublisherMux::new(publishers, vec!["amqp".into()], None).unwrap();
        let ctx = Ctx::background();
        let err = mux
            .publish_for_drivers(&ctx, "pr.opened", &event(), &["ghost".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PublishFailed(msg) if msg.contains("unknown driver")));
    }

    #[test]
    fn zero_publishers_fails_construction() {
        let err = PublisherMux::new(HashMap::new(), vec![], None).unwrap_err();
        assert!(matches!(err, Error::NoPublishersAvailable));
    }
}
