use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted rule (spec §3 "Rule (stored)").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    pub id: String,
    pub tenant_id: String,
    pub when: String,
    /// Exactly one non-empty topic after normalization (spec §3 invariant).
    /// Stored as a list only to accommodate legacy multi-emit rows read
    /// back from storage (spec §9 "Open question"); new writes must reject
    /// more than one entry.
    pub emit: Vec<String>,
    pub driver_id: String,
    pub transform_js: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rule {
    /// Content-derived stable id used whenever the caller omits one (spec
    /// §3 "Identity"): `SHA1("rule_" + trim(when) + "|" + join(sorted(trim(emit))) + "|" + trim(driver_id))`.
    pub fn derive_id(when: &str, emit: &[String], driver_id: &str) -> String {
        let mut sorted_emit: Vec<String> = emit.iter().map(|t| t.trim().to_string()).collect();
        sorted_emit.sort();
        let material = format!(
            "rule_{}|{}|{}",
            when.trim(),
            sorted_emit.join(","),
            driver_id.trim()
        );
        let mut hasher = sha1_smol::Sha1::new();
        hasher.update(material.as_bytes());
        hasher.digest().to_string()
    }

    /// Validate and normalize emit topics, rejecting multi-topic writes
    /// (spec §9 "new writes must reject multi-topic emits").
    pub fn normalize_new_emit(topics: &[String]) -> crate::error::Result<String> {
        let non_empty: Vec<&str> = topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        match non_empty.as_slice() {
            [] => Err(crate::error::Error::InvalidArgument(
                "rule.emit must contain exactly one non-empty topic".into(),
            )),
            [single] => Ok(single.to_string()),
            _ => Err(crate::error::Error::InvalidArgument(
                "rule.emit must contain exactly one topic; multi-emit is read-only legacy data"
                    .into(),
            )),
        }
    }
}

/// One rule matched against an event, ready for transform + publish (spec
/// §4.3 / GLOSSARY "Match").
///
/// When legacy data carries multiple emit topics on one rule row, the read
/// path fans that out into one `MatchedRule` per topic, all sharing the same
/// `id` (spec §9 "Open question").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRule {
    pub id: String,
    pub when: String,
    pub emit: String,
    pub driver_id: String,
    pub driver_name: Option<String>,
    pub transform_js: Option<String>,
}

impl Rule {
    /// Fan a stored rule out into its matched-rule representations, one per
    /// emit topic, for use once `when` has evaluated true against an event.
    pub fn to_matches(&self) -> Vec<MatchedRule> {
        self.emit
            .iter()
            .map(|topic| MatchedRule {
                id: self.id.clone(),
                when: self.when.clone(),
                emit: topic.clone(),
                driver_id: self.driver_id.clone(),
                driver_name: None,
                transform_js: self.transform_js.clone(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_id_is_stable_under_emit_reorder_and_whitespace() {
        let a = Rule::derive_id(
            "  action == \"opened\" ",
            &["pr.opened".to_string(), "pr.any".to_string()],
            " D1 ",
        );
        let b = Rule::derive_id(
            "action == \"opened\"",
            &["pr.any".to_string(), "pr.opened".to_string()],
            "D1",
        );
        assert_eq!(a, b);
    }

    #[test]
    fn derived_id_changes_with_content() {
        let a = Rule::derive_id("action == \"opened\"", &["pr.opened".to_string()], "D1");
        let b = Rule::derive_id("action == \"closed\"", &["pr.opened".to_string()], "D1");
        assert_ne!(a, b);
    }

    #[test]
    fn normalize_new_emit_rejects_multi_topic() {
        assert!(Rule::normalize_new_emit(&["a".into(), "b".into()]).is_err());
        assert!(Rule::normalize_new_emit(&[]).is_err());
        assert_eq!(Rule::normalize_new_emit(&["  a  ".into()]).unwrap(), "a");
    }
}
