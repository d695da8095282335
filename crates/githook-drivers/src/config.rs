use githook_core::DriverName;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {driver} driver config: {reason}")]
    Invalid { driver: &'static str, reason: String },
    #[error("driver config is not valid JSON: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    pub url: String,
    pub exchange: Option<String>,
    pub routing_key_template: Option<String>,
    #[serde(default)]
    pub mandatory: bool,
    #[serde(default)]
    pub immediate: bool,
    pub retry_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsConfig {
    pub url: String,
    pub subject_prefix: Option<String>,
    pub retry_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct KafkaConfig {
    pub brokers: Option<Vec<String>>,
    pub broker: Option<String>,
    pub topic_prefix: Option<String>,
    pub retry_count: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub endpoint: String,
    pub webhook_token: Option<String>,
    pub retry_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum DriverConfig {
    Amqp(AmqpConfig),
    Nats(NatsConfig),
    Kafka(KafkaConfig),
    Http(HttpConfig),
}

impl DriverConfig {
    pub fn retry_count(&self) -> Option<u32> {
        match self {
            DriverConfig::Amqp(c) => c.retry_count,
            DriverConfig::Nats(c) => c.retry_count,
            DriverConfig::Kafka(c) => c.retry_count,
            DriverConfig::Http(c) => c.retry_count,
        }
    }
}

/// Parse and validate `config_json` against the schema named by `driver`.
/// Pure function: no network I/O, no broker connection attempt (spec §4.4
/// "Validation of a config is a pure function and must not connect to the
/// broker").
pub fn parse_and_validate(driver: &DriverName, config_json: &str) -> Result<DriverConfig, ConfigError> {
    match driver {
        DriverName::Amqp => {
            let cfg: AmqpConfig =
                serde_json::from_str(config_json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            if cfg.url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    driver: "amqp",
                    reason: "url is required".into(),
                });
            }
            Ok(DriverConfig::Amqp(cfg))
        }
        DriverName::Nats => {
            let cfg: NatsConfig =
                serde_json::from_str(config_json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            if cfg.url.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    driver: "nats",
                    reason: "url is required".into(),
                });
            }
            Ok(DriverConfig::Nats(cfg))
        }
        DriverName::Kafka => {
            let cfg: KafkaConfig =
                serde_json::from_str(config_json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            let has_brokers = cfg.brokers.as_ref().map(|b| !b.is_empty()).unwrap_or(false);
            let has_broker = cfg.broker.as_ref().map(|b| !b.trim().is_empty()).unwrap_or(false);
            if !has_brokers && !has_broker {
                return Err(ConfigError::Invalid {
                    driver: "kafka",
                    reason: "either brokers[] or broker is required".into(),
                });
            }
            Ok(DriverConfig::Kafka(cfg))
        }
        DriverName::Http => {
            let cfg: HttpConfig =
                serde_json::from_str(config_json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
            if cfg.endpoint.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    driver: "http",
                    reason: "endpoint is required".into(),
                });
            }
            Ok(DriverConfig::Http(cfg))
        }
        DriverName::Other(name) => Err(ConfigError::Invalid {
            driver: "unknown",
            reason: format!("driver '{name}' has no recognised config schema"),
        }),
    }
}

/// Resolve the `{topic}` placeholder in an HTTP driver's endpoint template.
pub fn resolve_http_endpoint(template: &str, topic: &str) -> String {
    template.replace("{topic}", topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amqp_requires_url() {
        let err = parse_and_validate(&DriverName::Amqp, r#"{"exchange":"events"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed(_)));
    }

    #[test]
    fn amqp_rejects_blank_url() {
        let err = parse_and_validate(&DriverName::Amqp, r#"{"url":"  "}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { driver: "amqp", .. }));
    }

    #[test]
    fn kafka_accepts_single_broker_or_broker_list() {
        assert!(parse_and_validate(&DriverName::Kafka, r#"{"broker":"localhost:9092"}"#).is_ok());
        assert!(parse_and_validate(&DriverName::Kafka, r#"{"brokers":["a:9092","b:9092"]}"#).is_ok());
        assert!(parse_and_validate(&DriverName::Kafka, r#"{}"#).is_err());
    }

    #[test]
    fn http_endpoint_placeholder_is_substituted() {
        let resolved = resolve_http_endpoint("https://sink.example.com/{topic}/ingest", "pr.opened");
        assert_eq!(resolved, "https://sink.example.com/pr.opened/ingest");
    }

    #[test]
    fn does_not_connect_to_validate_nats_config() {
        let cfg = parse_and_validate(&DriverName::Nats, r#"{"url":"nats://broker.internal:4222"}"#).unwrap();
        assert!(matches!(cfg, DriverConfig::Nats(_)));
    }
}
