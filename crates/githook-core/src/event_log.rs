use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::HeaderMultimap;
use crate::error::{Error, Result};

/// Terminal status of one event-log row (spec §3 "EventLogRecord").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLogStatus {
    Pending,
    Success,
    Failed,
}

/// A durable per-request record (spec §3 "EventLogRecord (stored)").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogRecord {
    pub id: String,
    pub tenant_id: String,
    pub provider: String,
    pub name: String,
    pub request_id: String,
    pub state_id: Option<String>,
    pub installation_id: Option<String>,
    pub namespace_id: Option<String>,
    pub namespace_name: Option<String>,
    pub topic: Option<String>,
    pub rule_id: Option<String>,
    pub rule_when: Option<String>,
    pub drivers: Vec<String>,
    pub matched: bool,
    pub status: EventLogStatus,
    pub error_message: Option<String>,
    pub headers: HeaderMultimap,
    pub body: Vec<u8>,
    pub transformed_body: Option<Vec<u8>>,
    pub body_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filter accepted by `EventLogStore::List`/`Analytics`/`Timeseries`/
/// `Breakdown` (spec §4.2, §4.5).
#[derive(Debug, Clone, Default)]
pub struct EventLogFilter {
    pub tenant_id: Option<String>,
    pub provider: Option<String>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub request_id: Option<String>,
    pub state_id: Option<String>,
    pub installation_id: Option<String>,
    pub namespace_id: Option<String>,
    pub namespace_name: Option<String>,
    pub rule_id: Option<String>,
    pub rule_when: Option<String>,
    pub matched: Option<bool>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
}

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

/// An opaque pagination token encoding a non-negative integer offset (spec
/// §4.5, §6 "Event log pagination token").
pub struct PageToken;

impl PageToken {
    /// `encode(0) == ""` (spec §8 property 5).
    pub fn encode(offset: u64) -> String {
        if offset == 0 {
            return String::new();
        }
        BASE64_STANDARD.encode(offset.to_string())
    }

    /// Empty string means "first page" (offset 0); anything else must
    /// decode to a non-negative integer or `InvalidPageToken` is returned.
    pub fn decode(token: &str) -> Result<u64> {
        if token.is_empty() {
            return Ok(0);
        }
        let decoded = BASE64_STANDARD
            .decode(token)
            .map_err(|_| Error::InvalidArgument("invalid page token".into()))?;
        let text = String::from_utf8(decoded)
            .map_err(|_| Error::InvalidArgument("invalid page token".into()))?;
        let offset: i64 = text
            .parse()
            .map_err(|_| Error::InvalidArgument("invalid page token".into()))?;
        if offset < 0 {
            return Err(Error::InvalidArgument("invalid page token".into()));
        }
        Ok(offset as u64)
    }
}

/// Interval bucket for `Timeseries` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeInterval {
    Hour,
    Day,
    Week,
}

/// Grouping dimension for `Breakdown` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    Provider,
    Event,
    RuleId,
    RuleWhen,
    Topic,
    NamespaceId,
    NamespaceName,
    InstallationId,
}

/// Sort key for `Breakdown` (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownSort {
    Count,
    Matched,
    Failed,
}

#[derive(Debug, Clone)]
pub struct BreakdownQuery {
    pub filter: EventLogFilter,
    pub group_by: GroupBy,
    pub sort: BreakdownSort,
    pub desc: bool,
    pub page_size: u32,
    pub offset: u64,
    pub include_latency: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    pub total: u64,
    pub matched: u64,
    pub success: u64,
    pub failed: u64,
    pub pending: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub bucket_start: DateTime<Utc>,
    pub total: u64,
    pub matched: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub key: String,
    pub count: u64,
    pub matched: u64,
    pub failed: u64,
    pub avg_latency_ms: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_token_round_trips() {
        for offset in [0u64, 1, 50, 12345] {
            let encoded = PageToken::encode(offset);
            let decoded = PageToken::decode(&encoded).unwrap();
            assert_eq!(decoded, offset);
        }
    }

    #[test]
    fn zero_offset_encodes_to_empty_string() {
        assert_eq!(PageToken::encode(0), "");
    }

    #[test]
    fn empty_token_decodes_to_zero() {
        assert_eq!(PageToken::decode("").unwrap(), 0);
    }

    #[test]
    fn negative_offset_token_is_invalid() {
        let token = BASE64_STANDARD.encode("-1");
        assert!(matches!(
            PageToken::decode(&token),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_integer_token_is_invalid() {
        let token = BASE64_STANDARD.encode("not-a-number");
        assert!(matches!(
            PageToken::decode(&token),
            Err(Error::InvalidArgument(_))
        ));
    }
}
