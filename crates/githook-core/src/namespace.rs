use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::provider_instance::Provider;

/// A stored repository/project inventory row (spec §3 "NamespaceRecord
/// (stored)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceRecord {
    pub tenant_id: String,
    pub provider: Provider,
    pub repo_id: String,
    pub account_id: String,
    pub installation_id: String,
    pub provider_instance_key: String,
    pub owner: String,
    pub repo_name: String,
    pub full_name: String,
    pub visibility: String,
    pub default_branch: String,
    pub http_url: String,
    pub ssh_url: String,
    pub webhooks_enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter for `NamespaceStore::List` (spec §4.2).
#[derive(Debug, Clone, Default)]
pub struct NamespaceFilter {
    pub provider: Option<Provider>,
    pub installation_id: Option<String>,
    pub provider_instance_key: Option<String>,
}
