use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use boa_engine::{Context, Source};
use githook_core::Event;
use serde_json::{json, Value};
use thiserror::Error;

/// Wall-clock budget for one transform invocation (spec §4.3 "recommend
/// ≤ 200ms/transform").
const TRANSFORM_BUDGET: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("transform script failed to compile or run: {0}")]
    Script(String),
    #[error("transform exceeded its {0:?} execution budget")]
    TimedOut(Duration),
    #[error("transform result was not valid JSON: {0}")]
    InvalidResult(String),
}

/// Run a rule's `transform_js` against the matched event (spec §4.3
/// "Transforms"). `boa_engine` provides no filesystem or network bindings
/// by default, so the sandbox's capability surface is exactly the ECMAScript
/// standard library -- nothing is granted beyond it.
///
/// Returns the replacement `raw_payload` bytes for this match only; the
/// stored event log body is untouched by the caller.
pub fn run_transform(source: &str, event: &mut Event) -> Result<Vec<u8>, TransformError> {
    let payload = event.raw_object().clone();
    let context = event_context(event, &payload);
    let script = build_script(source, &payload, &context)?;

    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let result = execute(&script);
        let _ = tx.send(result);
    });

    match rx.recv_timeout(TRANSFORM_BUDGET) {
        Ok(result) => result,
        Err(_) => Err(TransformError::TimedOut(TRANSFORM_BUDGET)),
    }
}

fn event_context(event: &Event, payload: &Value) -> Value {
    json!({
        "provider": event.provider,
        "name": event.name,
        "request_id": event.request_id,
        "state_id": event.state_id,
        "tenant_id": event.tenant_id,
        "installation_id": event.installation_id,
        "namespace_id": event.namespace_id,
        "namespace_name": event.namespace_name,
        "data": flat_data_as_json(event),
        "payload": payload,
    })
}

fn flat_data_as_json(event: &Event) -> Value {
    let map: serde_json::Map<String, Value> = event
        .data
        .iter()
        .map(|(k, v)| {
            let value = match v {
                githook_core::event::FlatValue::Scalar(v) => v.clone(),
                githook_core::event::FlatValue::List(items) => Value::Array(items.clone()),
            };
            (k.clone(), value)
        })
        .collect();
    Value::Object(map)
}

fn build_script(source: &str, payload: &Value, context: &Value) -> Result<String, TransformError> {
    let payload_json = serde_json::to_string(payload).map_err(|e| TransformError::Script(e.to_string()))?;
    let context_json = serde_json::to_string(context).map_err(|e| TransformError::Script(e.to_string()))?;
    Ok(format!(
        r#"
        var __payload = {payload_json};
        var __context = {context_json};
        var transform = {source};
        (function() {{
            var __result = transform(__payload, __context);
            if (__result && typeof __result === 'object' && 'payload' in __result) {{
                __result = __result.payload;
            }}
            return JSON.stringify(__result);
        }})();
        "#
    ))
}

fn execute(script: &str) -> Result<Vec<u8>, TransformError> {
    let mut ctx = Context::default();
    let result = ctx
        .eval(Source::from_bytes(script))
        .map_err(|e| TransformError::Script(e.to_string()))?;
    let text = result
        .as_string()
        .ok_or_else(|| TransformError::InvalidResult("transform did not return a string".into()))?
        .to_std_string_escaped();
    let value: Value = serde_json::from_str(&text).map_err(|e| TransformError::InvalidResult(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| TransformError::InvalidResult(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use githook_core::event::HeaderMultimap;

    fn event(body: &str) -> Event {
        Event::new("github", "pull_request", "r1", "acme", body.as_bytes().to_vec(), HeaderMultimap::new())
    }

    #[test]
    fn transform_mutates_and_returns_payload() {
        let mut evt = event(r#"{"action":"opened"}"#);
        let out = run_transform("function t(p){p.replayed=true;return p}", &mut evt).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["replayed"], Value::Bool(true));
        assert_eq!(value["action"], Value::String("opened".into()));
    }

    #[test]
    fn transform_unwraps_payload_property_on_object_return() {
        let mut evt = event(r#"{"action":"opened"}"#);
        let out = run_transform(
            "function t(p, ctx){return {payload: {wrapped: true}, other: 1}}",
            &mut evt,
        )
        .unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value, json!({"wrapped": true}));
    }

    #[test]
    fn transform_can_read_event_context() {
        let mut evt = event(r#"{"action":"opened"}"#);
        let out = run_transform("function t(p, ctx){p.tenant = ctx.tenant_id; return p}", &mut evt).unwrap();
        let value: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["tenant"], Value::String("acme".into()));
    }

    #[test]
    fn script_errors_surface_as_transform_error() {
        let mut evt = event(r#"{"action":"opened"}"#);
        let err = run_transform("function t(p){throw new Error('boom')}", &mut evt).unwrap_err();
        assert!(matches!(err, TransformError::Script(_)));
    }
}
