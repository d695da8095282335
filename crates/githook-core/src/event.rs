use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An ordered multimap of header name to its values, preserving the order
/// headers were observed in the request (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeaderMultimap(pub Vec<(String, Vec<String>)>);

impl HeaderMultimap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if let Some((_, values)) = self.0.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&name)) {
            values.push(value.into());
        } else {
            self.0.push((name, vec![value.into()]));
        }
    }

    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .and_then(|(_, v)| v.first())
            .map(String::as_str)
    }
}

/// A scalar or list value in the flattened `Event.data` map (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FlatValue {
    Scalar(Value),
    List(Vec<Value>),
}

/// The in-memory, per-request normalized representation of one inbound
/// webhook (spec §3 "Event").
///
/// `raw_payload` is always the exact bytes received; `raw_object` and `data`
/// are lazily derived from it the first time either is needed, and cached
/// for the remainder of the request's lifetime.
#[derive(Debug, Clone)]
pub struct Event {
    pub provider: String,
    pub name: String,
    pub request_id: String,
    pub tenant_id: String,
    pub installation_id: Option<String>,
    pub namespace_id: Option<String>,
    pub namespace_name: Option<String>,
    pub state_id: Option<String>,
    pub provider_instance_key: Option<String>,
    pub headers: HeaderMultimap,
    pub raw_payload: Vec<u8>,
    raw_object: Option<Value>,
    pub data: HashMap<String, FlatValue>,
    pub log_id: Option<String>,
}

impl Event {
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        request_id: impl Into<String>,
        tenant_id: impl Into<String>,
        raw_payload: Vec<u8>,
        headers: HeaderMultimap,
    ) -> Self {
        Self {
            provider: provider.into(),
            name: name.into(),
            request_id: request_id.into(),
            tenant_id: tenant_id.into(),
            installation_id: None,
            namespace_id: None,
            namespace_name: None,
            state_id: None,
            provider_instance_key: None,
            headers,
            raw_payload,
            raw_object: None,
            data: HashMap::new(),
            log_id: None,
        }
    }

    /// Parse `raw_payload` on demand (spec §3 invariant: "raw_object ...
    /// lazily derived"), caching the parsed tree for subsequent callers.
    pub fn raw_object(&mut self) -> &Value {
        if self.raw_object.is_none() {
            let parsed =
                serde_json::from_slice::<Value>(&self.raw_payload).unwrap_or(Value::Null);
            self.raw_object = Some(parsed);
        }
        self.raw_object.as_ref().unwrap()
    }

    /// Non-mutating accessor for callers that have already forced parsing.
    pub fn raw_object_ref(&self) -> Option<&Value> {
        self.raw_object.as_ref()
    }

    /// Populate the flattened `data` map from a parsed JSON object, using
    /// dotted-path keys (`pull_request.merged`). Arrays at a leaf become
    /// `FlatValue::List`; everything else is `FlatValue::Scalar`.
    pub fn flatten_into_data(&mut self) {
        let root = self.raw_object().clone();
        let mut data = HashMap::new();
        flatten_value("", &root, &mut data);
        self.data = data;
    }
}

fn flatten_value(prefix: &str, value: &Value, out: &mut HashMap<String, FlatValue>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                flatten_value(&key, v, out);
            }
        }
        Value::Array(items) => {
            out.insert(prefix.to_string(), FlatValue::List(items.clone()));
        }
        other => {
            out.insert(prefix.to_string(), FlatValue::Scalar(other.clone()));
        }
    }
}
