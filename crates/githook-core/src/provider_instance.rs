use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The three supported Git hosting providers (spec §1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Github,
    Gitlab,
    Bitbucket,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Github => write!(f, "github"),
            Provider::Gitlab => write!(f, "gitlab"),
            Provider::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

impl std::str::FromStr for Provider {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "github" => Ok(Provider::Github),
            "gitlab" => Ok(Provider::Gitlab),
            "bitbucket" => Ok(Provider::Bitbucket),
            other => Err(crate::error::Error::FailedPrecondition(format!(
                "unsupported provider: {other}"
            ))),
        }
    }
}

/// A tenant-scoped configured provider binding (spec §3
/// "ProviderInstanceRecord (stored)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInstanceRecord {
    pub provider: Provider,
    /// 32-byte cryptographically random identifier, hex-encoded (64 chars).
    pub hash: String,
    pub tenant_id: String,
    pub config_json: String,
    pub redirect_base_url: Option<String>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
