use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider_instance::Provider;

/// A stored OAuth/App installation (spec §3 "InstallRecord (stored)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRecord {
    pub id: String,
    pub tenant_id: String,
    pub provider: Provider,
    pub account_id: String,
    pub account_name: String,
    pub installation_id: String,
    pub provider_instance_key: String,
    pub enterprise_id: Option<String>,
    pub enterprise_slug: Option<String>,
    pub enterprise_name: Option<String>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub metadata_json: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InstallRecord {
    /// A non-nil `expires_at` within 60s of `now` marks the token
    /// "should refresh" (spec §3).
    pub fn should_refresh_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(exp) => exp - now <= Duration::seconds(60),
            None => false,
        }
    }
}
