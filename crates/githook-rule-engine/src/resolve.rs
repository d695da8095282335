use std::collections::HashMap;

use githook_core::event::FlatValue;
use githook_core::Event;
use serde_json::Value;

use crate::ast::VariableRef;
use crate::error::EvalError;

fn flat_to_value(flat: &FlatValue) -> Value {
    match flat {
        FlatValue::Scalar(v) => v.clone(),
        FlatValue::List(items) => Value::Array(items.clone()),
    }
}

/// Resolve a rule's variable list against an event: plain identifiers are
/// looked up in the flattened dotted-key `data` map, JSONPath expressions
/// are evaluated against the parsed `raw_object` tree (spec §6 "parameter
/// resolution order: JSONPath against raw_object, otherwise the flat data
/// map"). Unresolved variables are simply absent from the returned map,
/// leaving missing-value handling to the evaluator's `MissingPolicy`.
pub fn resolve_variables(
    event: &mut Event,
    variables: &[VariableRef],
) -> Result<HashMap<String, Value>, EvalError> {
    let mut resolved = HashMap::new();
    for var in variables {
        let value = if var.is_jsonpath {
            resolve_jsonpath(event, &var.source)?
        } else {
            event.data.get(&var.source).map(flat_to_value)
        };
        if let Some(value) = value {
            resolved.insert(var.synthetic.clone(), value);
        }
    }
    Ok(resolved)
}

fn resolve_jsonpath(event: &mut Event, path: &str) -> Result<Option<Value>, EvalError> {
    let root = event.raw_object();
    let mut matches = jsonpath_lib::select(root, path).map_err(|e| EvalError::JsonPath(e.to_string()))?;
    match matches.len() {
        0 => Ok(None),
        1 => Ok(Some(matches.remove(0).clone())),
        _ => Ok(Some(Value::Array(matches.into_iter().cloned().collect()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use githook_core::event::HeaderMultimap;

    fn event_for(body: &str) -> Event {
        Event::new("github", "pull_request", "r1", "acme", body.as_bytes().to_vec(), HeaderMultimap::new())
    }

    #[test]
    fn resolves_flat_identifier_from_data_map() {
        let mut event = event_for(r#"{"action":"opened"}"#);
        event.flatten_into_data();
        let var = VariableRef {
            synthetic: "v_action".into(),
            source: "action".into(),
            is_jsonpath: false,
        };
        let resolved = resolve_variables(&mut event, &[var]).unwrap();
        assert_eq!(resolved.get("v_action"), Some(&Value::String("opened".into())));
    }

    #[test]
    fn resolves_jsonpath_against_raw_object() {
        let mut event = event_for(r#"{"pull_request":{"merged":true}}"#);
        let var = VariableRef {
            synthetic: "v_____pull_request_merged".into(),
            source: "$.pull_request.merged".into(),
            is_jsonpath: true,
        };
        let resolved = resolve_variables(&mut event, &[var.clone()]).unwrap();
        assert_eq!(resolved.get(&var.synthetic), Some(&Value::Bool(true)));
    }

    #[test]
    fn missing_identifier_is_simply_absent() {
        let mut event = event_for(r#"{"action":"opened"}"#);
        event.flatten_into_data();
        let var = VariableRef {
            synthetic: "v_nope".into(),
            source: "nope".into(),
            is_jsonpath: false,
        };
        let resolved = resolve_variables(&mut event, &[var]).unwrap();
        assert!(resolved.is_empty());
    }
}
