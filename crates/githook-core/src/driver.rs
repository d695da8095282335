use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The recognised driver names (spec §4.4); `Other` keeps the enum
/// extensible for brokers a plugin registers without a core release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverName {
    Amqp,
    Nats,
    Kafka,
    Http,
    Other(String),
}

impl std::fmt::Display for DriverName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DriverName::Amqp => write!(f, "amqp"),
            DriverName::Nats => write!(f, "nats"),
            DriverName::Kafka => write!(f, "kafka"),
            DriverName::Http => write!(f, "http"),
            DriverName::Other(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for DriverName {
    fn from(value: &str) -> Self {
        match value {
            "amqp" => DriverName::Amqp,
            "nats" => DriverName::Nats,
            "kafka" => DriverName::Kafka,
            "http" => DriverName::Http,
            other => DriverName::Other(other.to_string()),
        }
    }
}

/// A stored driver binding (spec §3 "DriverRecord (stored)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverRecord {
    pub id: String,
    pub tenant_id: String,
    pub name: DriverName,
    /// Driver-typed JSON document; schema depends on `name` (spec §4.4).
    pub config_json: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
