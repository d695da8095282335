use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use githook_core::{
    AnalyticsSummary, BreakdownQuery, BreakdownRow, BreakdownSort, Ctx, EventLogFilter,
    EventLogRecord, EventLogStatus, EventLogStore, GroupBy, Result, TimeInterval, TimeseriesPoint,
};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemEventLogStore {
    rows: Arc<Mutex<Vec<EventLogRecord>>>,
}

impl MemEventLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(r: &EventLogRecord, ctx: &Ctx, filter: &EventLogFilter) -> bool {
    let tenant = filter.tenant_id.as_deref().unwrap_or(ctx.tenant_id());
    if r.tenant_id != tenant {
        return false;
    }
    if let Some(v) = &filter.provider {
        if &r.provider != v {
            return false;
        }
    }
    if let Some(v) = &filter.name {
        if &r.name != v {
            return false;
        }
    }
    if let Some(v) = &filter.topic {
        if r.topic.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filter.request_id {
        if &r.request_id != v {
            return false;
        }
    }
    if let Some(v) = &filter.state_id {
        if r.state_id.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filter.installation_id {
        if r.installation_id.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filter.namespace_id {
        if r.namespace_id.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filter.namespace_name {
        if r.namespace_name.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filter.rule_id {
        if r.rule_id.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = &filter.rule_when {
        if r.rule_when.as_deref() != Some(v.as_str()) {
            return false;
        }
    }
    if let Some(v) = filter.matched {
        if r.matched != v {
            return false;
        }
    }
    if let Some(start) = filter.start {
        if r.created_at < start {
            return false;
        }
    }
    if let Some(end) = filter.end {
        if r.created_at > end {
            return false;
        }
    }
    true
}

fn bucket_start(dt: DateTime<Utc>, interval: TimeInterval) -> DateTime<Utc> {
    match interval {
        TimeInterval::Hour => Utc
            .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), dt.hour(), 0, 0)
            .single()
            .unwrap_or(dt),
        TimeInterval::Day => Utc
            .with_ymd_and_hms(dt.year(), dt.month(), dt.day(), 0, 0, 0)
            .single()
            .unwrap_or(dt),
        TimeInterval::Week => {
            let days_from_monday = dt.weekday().num_days_from_monday() as i64;
            let monday = dt.date_naive() - Duration::days(days_from_monday);
            Utc.with_ymd_and_hms(monday.year(), monday.month(), monday.day(), 0, 0, 0)
                .single()
                .unwrap_or(dt)
        }
    }
}

fn breakdown_key(r: &EventLogRecord, group_by: GroupBy) -> String {
    match group_by {
        GroupBy::Provider => r.provider.clone(),
        GroupBy::Event => r.name.clone(),
        GroupBy::RuleId => r.rule_id.clone().unwrap_or_default(),
        GroupBy::RuleWhen => r.rule_when.clone().unwrap_or_default(),
        GroupBy::Topic => r.topic.clone().unwrap_or_default(),
        GroupBy::NamespaceId => r.namespace_id.clone().unwrap_or_default(),
        GroupBy::NamespaceName => r.namespace_name.clone().unwrap_or_default(),
        GroupBy::InstallationId => r.installation_id.clone().unwrap_or_default(),
    }
}

#[async_trait]
impl EventLogStore for MemEventLogStore {
    async fn create(&self, _ctx: &Ctx, records: Vec<EventLogRecord>) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.extend(records);
        Ok(())
    }

    async fn get(&self, ctx: &Ctx, id: &str) -> Result<Option<EventLogRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| r.id == id && r.tenant_id == ctx.tenant_id())
            .cloned())
    }

    async fn list(&self, ctx: &Ctx, filter: EventLogFilter) -> Result<Vec<EventLogRecord>> {
        let rows = self.rows.lock().await;
        let mut matched: Vec<EventLogRecord> = rows
            .iter()
            .filter(|r| matches_filter(r, ctx, &filter))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.unwrap_or(u32::MAX) as usize;
        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_request_id(
        &self,
        ctx: &Ctx,
        provider: &str,
        request_id: &str,
    ) -> Result<Vec<EventLogRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| {
                r.tenant_id == ctx.tenant_id() && r.provider == provider && r.request_id == request_id
            })
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        ctx: &Ctx,
        id: &str,
        status: EventLogStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let mut rows = self.rows.lock().await;
        if let Some(row) = rows
            .iter_mut()
            .find(|r| r.id == id && r.tenant_id == ctx.tenant_id())
        {
            row.status = status;
            row.error_message = error_message;
            row.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn analytics(&self, ctx: &Ctx, filter: EventLogFilter) -> Result<AnalyticsSummary> {
        let rows = self.rows.lock().await;
        let matched: Vec<&EventLogRecord> = rows.iter().filter(|r| matches_filter(r, ctx, &filter)).collect();
        let total = matched.len() as u64;
        let rule_matched = matched.iter().filter(|r| r.matched).count() as u64;
        let success = matched
            .iter()
            .filter(|r| r.status == EventLogStatus::Success)
            .count() as u64;
        let failed = matched
            .iter()
            .filter(|r| r.status == EventLogStatus::Failed)
            .count() as u64;
        let pending = matched
            .iter()
            .filter(|r| r.status == EventLogStatus::Pending)
            .count() as u64;
        Ok(AnalyticsSummary {
            total,
            matched: rule_matched,
            success,
            failed,
            pending,
        })
    }

    async fn timeseries(
        &self,
        ctx: &Ctx,
        filter: EventLogFilter,
        interval: TimeInterval,
    ) -> Result<Vec<TimeseriesPoint>> {
        let rows = self.rows.lock().await;
        let mut buckets: std::collections::BTreeMap<DateTime<Utc>, TimeseriesPoint> =
            std::collections::BTreeMap::new();
        for r in rows.iter().filter(|r| matches_filter(r, ctx, &filter)) {
            let start = bucket_start(r.created_at, interval);
            let point = buckets.entry(start).or_insert(TimeseriesPoint {
                bucket_start: start,
                total: 0,
                matched: 0,
                failed: 0,
            });
            point.total += 1;
            if r.matched {
                point.matched += 1;
            }
            if r.status == EventLogStatus::Failed {
                point.failed += 1;
            }
        }
        Ok(buckets.into_values().collect())
    }

    async fn breakdown(&self, ctx: &Ctx, query: BreakdownQuery) -> Result<Vec<BreakdownRow>> {
        let rows = self.rows.lock().await;
        let mut groups: std::collections::HashMap<String, (u64, u64, u64)> =
            std::collections::HashMap::new();
        for r in rows.iter().filter(|r| matches_filter(r, ctx, &query.filter)) {
            let key = breakdown_key(r, query.group_by);
            let entry = groups.entry(key).or_insert((0, 0, 0));
            entry.0 += 1;
            if r.matched {
                entry.1 += 1;
            }
            if r.status == EventLogStatus::Failed {
                entry.2 += 1;
            }
        }
        let mut out: Vec<BreakdownRow> = groups
            .into_iter()
            .map(|(key, (count, matched, failed))| BreakdownRow {
                key,
                count,
                matched,
                failed,
                avg_latency_ms: None,
            })
            .collect();
        out.sort_by(|a, b| {
            let ord = match query.sort {
                BreakdownSort::Count => a.count.cmp(&b.count),
                BreakdownSort::Matched => a.matched.cmp(&b.matched),
                BreakdownSort::Failed => a.failed.cmp(&b.failed),
            };
            if query.desc {
                ord.reverse()
            } else {
                ord
            }
        });
        let offset = query.offset as usize;
        let size = query.page_size as usize;
        Ok(out.into_iter().skip(offset).take(size).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use githook_core::HeaderMultimap;

    fn record(status: EventLogStatus, matched: bool) -> EventLogRecord {
        let now = Utc::now();
        EventLogRecord {
            id: githook_core::normalize_tenant("") + "-" + &uuid_like(),
            tenant_id: "acme".into(),
            provider: "github".into(),
            name: "pull_request".into(),
            request_id: "r1".into(),
            state_id: None,
            installation_id: None,
            namespace_id: None,
            namespace_name: None,
            topic: Some("pr.opened".into()),
            rule_id: Some("rule-1".into()),
            rule_when: Some("action == \"opened\"".into()),
            drivers: vec!["amqp".into()],
            matched,
            status,
            error_message: None,
            headers: HeaderMultimap::new(),
            body: b"{}".to_vec(),
            transformed_body: None,
            body_hash: "deadbeef".into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn uuid_like() -> String {
        format!("{:x}", Utc::now().timestamp_nanos_opt().unwrap_or(0))
    }

    #[tokio::test]
    async fn create_then_list_returns_row() {
        let store = MemEventLogStore::new();
        let ctx = Ctx::new("acme");
        store
            .create(&ctx, vec![record(EventLogStatus::Success, true)])
            .await
            .unwrap();
        let rows = store.list(&ctx, EventLogFilter::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn find_by_request_id_is_tenant_and_provider_scoped() {
        let store = MemEventLogStore::new();
        let ctx = Ctx::new("acme");
        store
            .create(&ctx, vec![record(EventLogStatus::Success, true)])
            .await
            .unwrap();
        let found = store
            .find_by_request_id(&ctx, "github", "r1")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let not_found = store
            .find_by_request_id(&ctx, "gitlab", "r1")
            .await
            .unwrap();
        assert!(not_found.is_empty());
    }

    #[tokio::test]
    async fn analytics_counts_status_buckets() {
        let store = MemEventLogStore::new();
        let ctx = Ctx::new("acme");
        store
            .create(
                &ctx,
                vec![
                    record(EventLogStatus::Success, true),
                    record(EventLogStatus::Failed, true),
                    record(EventLogStatus::Success, false),
                ],
            )
            .await
            .unwrap();
        let summary = store.analytics(&ctx, EventLogFilter::default()).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failed, 1);
    }

    #[tokio::test]
    async fn breakdown_groups_by_topic_and_sorts_desc() {
        let store = MemEventLogStore::new();
        let ctx = Ctx::new("acme");
        store
            .create(
                &ctx,
                vec![record(EventLogStatus::Success, true), record(EventLogStatus::Success, true)],
            )
            .await
            .unwrap();
        let rows = store
            .breakdown(
                &ctx,
                BreakdownQuery {
                    filter: EventLogFilter::default(),
                    group_by: GroupBy::Topic,
                    sort: BreakdownSort::Count,
                    desc: true,
                    page_size: 10,
                    offset: 0,
                    include_latency: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "pr.opened");
        assert_eq!(rows[0].count, 2);
    }
}
