use std::sync::Arc;
use std::time::Duration;

use githook_core::{Ctx, DriverName, DriverRecord, Error, Result};
use tracing::warn;

use crate::config::{parse_and_validate, DriverConfig};
use crate::drivers::{amqp::AmqpPublisher, http::HttpPublisher, nats::NatsPublisher};
use crate::publisher::Publisher;

const CONSTRUCTION_ATTEMPTS: u32 = 10;
const CONSTRUCTION_PAUSE: Duration = Duration::from_secs(2);

/// Build a single publisher for a stored driver record, retrying up to 10
/// times with a 2s pause between attempts and honoring cancellation (spec
/// §4.4 "Publisher construction"). Callers that want "a driver whose
/// publisher cannot be built after all attempts is omitted" should catch
/// the error and skip the driver rather than propagate it.
pub async fn build_publisher(ctx: &Ctx, record: &DriverRecord) -> Result<Arc<dyn Publisher>> {
    let config = parse_and_validate(&record.name, &record.config_json)
        .map_err(|e| Error::FailedPrecondition(e.to_string()))?;

    let mut last_err = Error::FailedPrecondition("publisher construction never attempted".into());
    for attempt in 0..CONSTRUCTION_ATTEMPTS {
        ctx.check()?;
        match try_build_once(&config).await {
            Ok(publisher) => return Ok(publisher),
            Err(err) => {
                warn!(
                    attempt,
                    driver = %record.name,
                    tenant = %record.tenant_id,
                    error = %err,
                    "publisher construction attempt failed"
                );
                last_err = err;
                if attempt + 1 < CONSTRUCTION_ATTEMPTS {
                    ctx.run(tokio::time::sleep(CONSTRUCTION_PAUSE)).await?;
                }
            }
        }
    }
    Err(last_err)
}

async fn try_build_once(config: &DriverConfig) -> Result<Arc<dyn Publisher>> {
    match config {
        DriverConfig::Amqp(cfg) => Ok(Arc::new(AmqpPublisher::connect(cfg).await?)),
        DriverConfig::Nats(cfg) => Ok(Arc::new(NatsPublisher::connect(cfg).await?)),
        DriverConfig::Http(cfg) => Ok(Arc::new(HttpPublisher::new(cfg)?)),
        DriverConfig::Kafka(cfg) => build_kafka(cfg),
    }
}

#[cfg(feature = "kafka-producer")]
fn build_kafka(cfg: &crate::config::KafkaConfig) -> Result<Arc<dyn Publisher>> {
    Ok(Arc::new(crate::drivers::kafka::KafkaPublisher::connect(cfg)?))
}

#[cfg(not(feature = "kafka-producer"))]
fn build_kafka(_cfg: &crate::config::KafkaConfig) -> Result<Arc<dyn Publisher>> {
    Err(Error::FailedPrecondition(
        "kafka driver support is not compiled into this build (enable the `kafka-producer` feature)".into(),
    ))
}

pub fn unsupported_driver(name: &DriverName) -> Error {
    Error::FailedPrecondition(format!("unsupported driver: {name}"))
}
