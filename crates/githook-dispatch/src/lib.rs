use githook_core::{
    Ctx, DriverStore, Error as CoreError, Event, EventLogRecord, EventLogStatus, Result,
};
use githook_drivers::{resolve_driver_name, PublisherMux};
use githook_rule_engine::RuleEngine;
use tracing::warn;

/// Run the dispatch pipeline for one normalized event (spec §4.7): evaluate
/// rules, then per match apply transform, resolve the driver, publish, and
/// build a terminal event log row. Per-match failures are isolated — one
/// match failing never aborts its siblings or the overall call, matching
/// "the overall pipeline returns HTTP 200 once every match has a terminal
/// log entry, even if some are failed". A zero-match event still produces
/// one unmatched row so intake always leaves a durable trace.
pub async fn dispatch(
    ctx: &Ctx,
    event: &mut Event,
    rule_engine: &RuleEngine,
    drivers: &dyn DriverStore,
    mux: &PublisherMux,
) -> Result<Vec<EventLogRecord>> {
    if event.log_id.is_none() {
        event.log_id = Some(githook_crypto::random_hex_id());
    }

    let matches = rule_engine
        .evaluate(event)
        .map_err(|e| CoreError::InvalidArgument(e.to_string()))?;

    if matches.is_empty() {
        return Ok(vec![unmatched_row(event)]);
    }

    let mut records = Vec::with_capacity(matches.len());
    for matched in &matches {
        let mut match_event = event.clone();
        let mut status = EventLogStatus::Success;
        let mut error_message = None;
        let mut transformed_body = None;
        let mut driver_used = None;

        match resolve_driver_name(ctx, drivers, &matched.driver_id).await {
            Ok(driver_name) => {
                if let Some(script) = &matched.transform_js {
                    match githook_transform::run_transform(script, &mut match_event) {
                        Ok(bytes) => {
                            match_event.raw_payload = bytes.clone();
                            transformed_body = Some(bytes);
                        }
                        Err(e) => {
                            status = EventLogStatus::Failed;
                            error_message = Some(e.to_string());
                        }
                    }
                }
                if status == EventLogStatus::Success {
                    match mux
                        .publish_for_drivers(ctx, &matched.emit, &match_event, &[driver_name.clone()])
                        .await
                    {
                        Ok(()) => driver_used = Some(driver_name),
                        Err(e) => {
                            warn!(rule = %matched.id, error = %e, "dispatch publish failed");
                            status = EventLogStatus::Failed;
                            error_message = Some(e.to_string());
                            driver_used = Some(driver_name);
                        }
                    }
                }
            }
            Err(e) => {
                status = EventLogStatus::Failed;
                error_message = Some(e.to_string());
            }
        }

        records.push(matched_row(
            &match_event,
            matched,
            status,
            error_message,
            driver_used,
            transformed_body,
        ));
    }

    Ok(records)
}

fn unmatched_row(event: &Event) -> EventLogRecord {
    let now = chrono_now();
    EventLogRecord {
        id: githook_crypto::random_hex_id(),
        tenant_id: event.tenant_id.clone(),
        provider: event.provider.clone(),
        name: event.name.clone(),
        request_id: event.request_id.clone(),
        state_id: event.state_id.clone(),
        installation_id: event.installation_id.clone(),
        namespace_id: event.namespace_id.clone(),
        namespace_name: event.namespace_name.clone(),
        topic: None,
        rule_id: None,
        rule_when: None,
        drivers: Vec::new(),
        matched: false,
        status: EventLogStatus::Success,
        error_message: None,
        headers: event.headers.clone(),
        body: event.raw_payload.clone(),
        transformed_body: None,
        body_hash: githook_crypto::sha256_hex(&event.raw_payload),
        created_at: now,
        updated_at: now,
    }
}

fn matched_row(
    event: &Event,
    matched: &githook_core::MatchedRule,
    status: EventLogStatus,
    error_message: Option<String>,
    driver_name: Option<String>,
    transformed_body: Option<Vec<u8>>,
) -> EventLogRecord {
    let now = chrono_now();
    EventLogRecord {
        id: githook_crypto::random_hex_id(),
        tenant_id: event.tenant_id.clone(),
        provider: event.provider.clone(),
        name: event.name.clone(),
        request_id: event.request_id.clone(),
        state_id: event.state_id.clone(),
        installation_id: event.installation_id.clone(),
        namespace_id: event.namespace_id.clone(),
        namespace_name: event.namespace_name.clone(),
        topic: Some(matched.emit.clone()),
        rule_id: Some(matched.id.clone()),
        rule_when: Some(matched.when.clone()),
        drivers: driver_name.into_iter().collect(),
        matched: true,
        status,
        error_message,
        headers: event.headers.clone(),
        body: event.raw_payload.clone(),
        transformed_body,
        body_hash: githook_crypto::sha256_hex(&event.raw_payload),
        created_at: now,
        updated_at: now,
    }
}

fn chrono_now() -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use githook_core::{
        DriverName, DriverRecord, HeaderMultimap, Provider, Rule,
    };
    use githook_drivers::Publisher;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeDrivers(Mutex<HashMap<String, DriverRecord>>);

    #[async_trait]
    impl DriverStore for FakeDrivers {
        async fn get(&self, _ctx: &Ctx, name: &str) -> Result<Option<DriverRecord>> {
            Ok(self.0.lock().unwrap().get(name).cloned())
        }
        async fn get_by_id(&self, _ctx: &Ctx, id: &str) -> Result<Option<DriverRecord>> {
            Ok(self.0.lock().unwrap().values().find(|r| r.id == id).cloned())
        }
        async fn list(&self, _ctx: &Ctx) -> Result<Vec<DriverRecord>> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }
        async fn upsert(&self, _ctx: &Ctx, record: DriverRecord) -> Result<DriverRecord> {
            self.0.lock().unwrap().insert(record.id.clone(), record.clone());
            Ok(record)
        }
        async fn delete(&self, _ctx: &Ctx, name: &str) -> Result<()> {
            self.0.lock().unwrap().remove(name);
            Ok(())
        }
    }

    struct RecordingPublisher {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, _ctx: &Ctx, _topic: &str, _event: &Event) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CoreError::PublishFailed("boom".into()))
            } else {
                Ok(())
            }
        }
        async fn close(&self, _ctx: &Ctx) -> Result<()> {
            Ok(())
        }
    }

    fn driver_record() -> DriverRecord {
        DriverRecord {
            id: "d1".into(),
            tenant_id: "acme".into(),
            name: DriverName::Amqp,
            config_json: "{}".into(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rule(when: &str, emit: &str) -> Rule {
        Rule {
            id: Rule::derive_id(when, &[emit.to_string()], "d1"),
            tenant_id: "acme".into(),
            when: when.to_string(),
            emit: vec![emit.to_string()],
            driver_id: "d1".into(),
            transform_js: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn event() -> Event {
        Event::new(
            "github",
            "pull_request",
            "r1",
            "acme",
            br#"{"action":"opened"}"#.to_vec(),
            HeaderMultimap::new(),
        )
    }

    #[tokio::test]
    async fn matching_rule_publishes_and_records_success() {
        let drivers = FakeDrivers(Mutex::new(HashMap::from([("d1".to_string(), driver_record())])));
        let rule_engine = RuleEngine::default();
        rule_engine
            .update("acme", &[rule("action == \"opened\"", "pr.opened")], false)
            .unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let mut publishers: HashMap<String, Arc<dyn Publisher>> = HashMap::new();
        publishers.insert(
            "amqp".into(),
            Arc::new(RecordingPublisher {
                calls: calls.clone(),
                fail: false,
            }),
        );
        let mux = PublisherMux::new(publishers, vec!["amqp".into()], None).unwrap();

        let ctx = Ctx::background();
        let mut evt = event();
        let records = dispatch(&ctx, &mut evt, &rule_engine, &drivers, &mux).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, EventLogStatus::Success);
        assert!(records[0].matched);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(evt.log_id.is_some());
    }

    #[tokio::test]
    async fn zero_matches_yields_one_unmatched_row() {
        let drivers = FakeDrivers(Mutex::new(HashMap::new()));
        let rule_engine = RuleEngine::default();
        let mux = PublisherMux::new(
            HashMap::from([(
                "amqp".to_string(),
                Arc::new(RecordingPublisher {
                    calls: Arc::new(AtomicUsize::new(0)),
                    fail: false,
                }) as Arc<dyn Publisher>,
            )]),
            vec!["amqp".into()],
            None,
        )
        .unwrap();
        let ctx = Ctx::background();
        let mut evt = event();
        let records = dispatch(&ctx, &mut evt, &rule_engine, &drivers, &mux).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].matched);
        assert_eq!(records[0].status, EventLogStatus::Success);
    }

    #[tokio::test]
    async fn publish_failure_on_one_match_is_isolated() {
        let drivers = FakeDrivers(Mutex::new(HashMap::from([("d1".to_string(), driver_record())])));
        let rule_engine = RuleEngine::default();
        rule_engine
            .update("acme", &[rule("action == \"opened\"", "pr.opened")], false)
            .unwrap();
        let mux = PublisherMux::new(
            HashMap::from([(
                "amqp".to_string(),
                Arc::new(RecordingPublisher {
                    calls: Arc::new(AtomicUsize::new(0)),
                    fail: true,
                }) as Arc<dyn Publisher>,
            )]),
            vec!["amqp".into()],
            None,
        )
        .unwrap();
        let ctx = Ctx::background();
        let mut evt = event();
        let records = dispatch(&ctx, &mut evt, &rule_engine, &drivers, &mux).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, EventLogStatus::Failed);
        assert!(records[0].error_message.is_some());
    }

    #[tokio::test]
    async fn unresolvable_driver_fails_just_that_match() {
        let drivers = FakeDrivers(Mutex::new(HashMap::new()));
        let rule_engine = RuleEngine::default();
        rule_engine
            .update("acme", &[rule("action == \"opened\"", "pr.opened")], false)
            .unwrap();
        let mux = PublisherMux::new(
            HashMap::from([(
                "amqp".to_string(),
                Arc::new(RecordingPublisher {
                    calls: Arc::new(AtomicUsize::new(0)),
                    fail: false,
                }) as Arc<dyn Publisher>,
            )]),
            vec!["amqp".into()],
            None,
        )
        .unwrap();
        let ctx = Ctx::background();
        let mut evt = event();
        let records = dispatch(&ctx, &mut evt, &rule_engine, &drivers, &mux).await.unwrap();
        assert_eq!(records[0].status, EventLogStatus::Failed);
    }

    #[allow(dead_code)]
    fn unused_provider_hint(_p: Provider) {}
}
