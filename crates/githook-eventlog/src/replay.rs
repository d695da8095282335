use githook_core::{Ctx, DriverStore, Error as CoreError, Event, EventLogStore, Result};
use githook_drivers::PublisherMux;
use githook_rule_engine::RuleEngine;
use tracing::warn;

/// Outcome of a successful `ReplayEventLog` (spec §4.5).
pub struct ReplayOutcome {
    pub log_id: String,
    pub topic: String,
    pub driver_name: String,
}

/// `ReplayEventLog(log_id, driver_name)` (spec §4.5): load the record,
/// refuse if its topic is empty or `driver_name` names a disabled driver,
/// re-derive an `Event` from the stored body, run the current tenant rule
/// set against it, and for every resulting match reapply its transform and
/// publish to exactly `driver_name`. The stored record itself is never
/// mutated.
pub async fn replay_event_log(
    ctx: &Ctx,
    log_id: &str,
    driver_name: &str,
    event_log: &dyn EventLogStore,
    drivers: &dyn DriverStore,
    rule_engine: &RuleEngine,
    mux: &PublisherMux,
) -> Result<ReplayOutcome> {
    let record = event_log
        .get(ctx, log_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("event log {log_id}")))?;

    let topic = record
        .topic
        .clone()
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| CoreError::FailedPrecondition("event log row has no topic".into()))?;

    let driver = drivers
        .get(ctx, driver_name)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("driver {driver_name}")))?;
    if !driver.enabled {
        return Err(CoreError::FailedPrecondition(format!("driver {driver_name} is disabled")));
    }

    let raw_payload = if serde_json::from_slice::<serde_json::Value>(&record.body).is_ok() {
        record.body.clone()
    } else if let Some(transformed) = &record.transformed_body {
        transformed.clone()
    } else {
        return Err(CoreError::InvalidArgument(
            "event log body and transformed_body are both unparseable".into(),
        ));
    };

    let mut event = Event::new(
        record.provider.clone(),
        record.name.clone(),
        record.request_id.clone(),
        record.tenant_id.clone(),
        raw_payload,
        record.headers.clone(),
    );
    event.installation_id = record.installation_id.clone();
    event.namespace_id = record.namespace_id.clone();
    event.namespace_name = record.namespace_name.clone();
    event.state_id = record.state_id.clone();
    event.flatten_into_data();

    let matches = rule_engine.evaluate(&mut event).map_err(|e| CoreError::InvalidArgument(e.to_string()))?;
    if matches.is_empty() {
        return Err(CoreError::NoMatchingRules);
    }

    let mut errors = Vec::new();
    for matched in &matches {
        let mut match_event = event.clone();
        if let Some(script) = &matched.transform_js {
            match githook_transform::run_transform(script, &mut match_event) {
                Ok(transformed) => match_event.raw_payload = transformed,
                Err(e) => {
                    errors.push(format!("rule {}: {e}", matched.id));
                    continue;
                }
            }
        }
        if let Err(e) = mux
            .publish_for_drivers(ctx, &topic, &match_event, &[driver_name.to_string()])
            .await
        {
            warn!(rule = %matched.id, driver = driver_name, error = %e, "replay publish failed");
            errors.push(format!("rule {}: {e}", matched.id));
        }
    }

    if !errors.is_empty() {
        return Err(CoreError::PublishFailed(errors.join("; ")));
    }

    Ok(ReplayOutcome {
        log_id: log_id.to_string(),
        topic,
        driver_name: driver_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use githook_core::{
        AnalyticsSummary, BreakdownQuery, BreakdownRow, DriverName, DriverRecord, Event as CoreEvent,
        EventLogFilter, EventLogRecord, EventLogStatus, HeaderMultimap, Rule, TimeInterval,
        TimeseriesPoint,
    };
    use githook_drivers::Publisher;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    struct FakeEventLog(Mutex<HashMap<String, EventLogRecord>>);

    #[async_trait]
    impl EventLogStore for FakeEventLog {
        async fn create(&self, _ctx: &Ctx, records: Vec<EventLogRecord>) -> Result<()> {
            let mut guard = self.0.lock().unwrap();
            for r in records {
                guard.insert(r.id.clone(), r);
            }
            Ok(())
        }

        async fn get(&self, _ctx: &Ctx, id: &str) -> Result<Option<EventLogRecord>> {
            Ok(self.0.lock().unwrap().get(id).cloned())
        }

        async fn list(&self, _ctx: &Ctx, _filter: EventLogFilter) -> Result<Vec<EventLogRecord>> {
            Ok(self.0.lock().unwrap().values().cloned().collect())
        }

        async fn find_by_request_id(
            &self,
            _ctx: &Ctx,
            _provider: &str,
            _request_id: &str,
        ) -> Result<Vec<EventLogRecord>> {
            Ok(Vec::new())
        }

        async fn update_status(
            &self,
            _ctx: &Ctx,
            _id: &str,
            _status: EventLogStatus,
            _error_message: Option<String>,
        ) -> Result<()> {
            Ok(())
        }

        async fn analytics(&self, _ctx: &Ctx, _filter: EventLogFilter) -> Result<AnalyticsSummary> {
            unimplemented!()
        }

        async fn timeseries(
            &self,
            _ctx: &Ctx,
            _filter: EventLogFilter,
            _interval: TimeInterval,
        ) -> Result<Vec<TimeseriesPoint>> {
            unimplemented!()
        }

        async fn breakdown(&self, _ctx: &Ctx, _query: BreakdownQuery) -> Result<Vec<BreakdownRow>> {
            unimplemented!()
        }
    }

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
            self.0
                .lock()
                .unwrap()
                .insert(record.name.to_string(), record.clone());
            Ok(record)
        }

        async fn delete(&self, _ctx: &Ctx, name: &str) -> Result<()> {
            self.0.lock().unwrap().remove(name);
            Ok(())
        }
    }

    struct RecordingPublisher(Arc<AtomicUsize>);

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, _ctx: &Ctx, _topic: &str, _event: &CoreEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn close(&self, _ctx: &Ctx) -> Result<()> {
            Ok(())
        }
    }

    fn driver_record(name: DriverName, enabled: bool) -> DriverRecord {
        DriverRecord {
            id: "d1".into(),
            tenant_id: "acme".into(),
            name,
            config_json: "{}".into(),
            enabled,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn log_record(topic: Option<&str>) -> EventLogRecord {
        EventLogRecord {
            id: "log-1".into(),
            tenant_id: "acme".into(),
            provider: "github".into(),
            name: "pull_request".into(),
            request_id: "r1".into(),
            state_id: None,
            installation_id: None,
            namespace_id: None,
            namespace_name: None,
            topic: topic.map(str::to_string),
            rule_id: None,
            rule_when: None,
            drivers: vec![],
            matched: false,
            status: EventLogStatus::Success,
            error_message: None,
            headers: HeaderMultimap::new(),
            body: br#"{"action":"opened"}"#.to_vec(),
            transformed_body: None,
            body_hash: String::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn rule(when: &str, emit: &str, driver_id: &str) -> Rule {
        Rule {
            id: Rule::derive_id(when, &[emit.to_string()], driver_id),
            tenant_id: "acme".into(),
            when: when.to_string(),
            emit: vec![emit.to_string()],
            driver_id: driver_id.to_string(),
            transform_js: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn replays_matching_rule_to_named_driver() {
        let event_log = FakeEventLog(Mutex::new(HashMap::from([(
            "log-1".to_string(),
            log_record(Some("pr.opened")),
        )])));
        let mut drivers_map = HashMap::new();
        drivers_map.insert("amqp".to_string(), driver_record(DriverName::Amqp, true));
        let drivers = FakeDrivers(Mutex::new(drivers_map));

        let rule_engine = RuleEngine::default();
        rule_engine
            .update("acme", &[rule("action == \"opened\"", "pr.opened", "d1")], false)
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let mut publishers: HashMap<String, Arc<dyn Publisher>> = HashMap::new();
        publishers.insert("amqp".into(), Arc::new(RecordingPublisher(calls.clone())));
        let mux = PublisherMux::new(publishers, vec!["amqp".into()], None).unwrap();

        let ctx = Ctx::background();
        let outcome = replay_event_log(&ctx, "log-1", "amqp", &event_log, &drivers, &rule_engine, &mux)
            .await
            .unwrap();
        assert_eq!(outcome.topic, "pr.opened");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_topic_is_rejected() {
        let event_log = FakeEventLog(Mutex::new(HashMap::from([(
            "log-1".to_string(),
            log_record(None),
        )])));
        let drivers = FakeDrivers(Mutex::new(HashMap::new()));
        let rule_engine = RuleEngine::default();
        let mux = PublisherMux::new(
            HashMap::from([(
                "amqp".to_string(),
                Arc::new(RecordingPublisher(Arc::new(AtomicUsize::new(0)))) as Arc<dyn Publisher>,
            )]),
            vec!["amqp".into()],
            None,
        )
        .unwrap();
        let ctx = Ctx::background();
        let err = replay_event_log(&ctx, "log-1", "amqp", &event_log, &drivers, &rule_engine, &mux)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn no_matching_rules_is_reported() {
        let event_log = FakeEventLog(Mutex::new(HashMap::from([(
            "log-1".to_string(),
            log_record(Some("pr.opened")),
        )])));
        let mut drivers_map = HashMap::new();
        drivers_map.insert("amqp".to_string(), driver_record(DriverName::Amqp, true));
        let drivers = FakeDrivers(Mutex::new(drivers_map));
        let rule_engine = RuleEngine::default();
        rule_engine
            .update("acme", &[rule("action == \"closed\"", "pr.closed", "d1")], false)
            .unwrap();
        let mux = PublisherMux::new(
            HashMap::from([(
                "amqp".to_string(),
                Arc::new(RecordingPublisher(Arc::new(AtomicUsize::new(0)))) as Arc<dyn Publisher>,
            )]),
            vec!["amqp".into()],
            None,
        )
        .unwrap();
        let ctx = Ctx::background();
        let err = replay_event_log(&ctx, "log-1", "amqp", &event_log, &drivers, &rule_engine, &mux)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NoMatchingRules));
    }

    #[tokio::test]
    async fn disabled_driver_is_rejected() {
        let event_log = FakeEventLog(Mutex::new(HashMap::from([(
            "log-1".to_string(),
            log_record(Some("pr.opened")),
        )])));
        let mut drivers_map = HashMap::new();
        drivers_map.insert("amqp".to_string(), driver_record(DriverName::Amqp, false));
        let drivers = FakeDrivers(Mutex::new(drivers_map));
        let rule_engine = RuleEngine::default();
        let mux = PublisherMux::new(
            HashMap::from([(
                "amqp".to_string(),
                Arc::new(RecordingPublisher(Arc::new(AtomicUsize::new(0)))) as Arc<dyn Publisher>,
            )]),
            vec!["amqp".into()],
            None,
        )
        .unwrap();
        let ctx = Ctx::background();
        let err = replay_event_log(&ctx, "log-1", "amqp", &event_log, &drivers, &rule_engine, &mux)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FailedPrecondition(_)));
    }
}
