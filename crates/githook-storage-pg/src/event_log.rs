use async_trait::async_trait;
use chrono::{DateTime, Utc};
use githook_core::{
    AnalyticsSummary, BreakdownQuery, BreakdownRow, BreakdownSort, Ctx, Error, EventLogFilter,
    EventLogRecord, EventLogStatus, EventLogStore, GroupBy, HeaderMultimap, Result, TimeInterval,
    TimeseriesPoint,
};
use sqlx::{postgres::Postgres, types::Json, PgPool, QueryBuilder, Row};

#[derive(sqlx::FromRow)]
struct EventLogRow {
    id: String,
    tenant_id: String,
    provider: String,
    name: String,
    request_id: String,
    state_id: Option<String>,
    installation_id: Option<String>,
    namespace_id: Option<String>,
    namespace_name: Option<String>,
    topic: Option<String>,
    rule_id: Option<String>,
    rule_when: Option<String>,
    drivers: Vec<String>,
    matched: bool,
    status: String,
    error_message: Option<String>,
    headers: Json<HeaderMultimap>,
    body: Vec<u8>,
    transformed_body: Option<Vec<u8>>,
    body_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

fn status_to_str(status: EventLogStatus) -> &'static str {
    match status {
        EventLogStatus::Pending => "pending",
        EventLogStatus::Success => "success",
        EventLogStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> Result<EventLogStatus> {
    match s {
        "pending" => Ok(EventLogStatus::Pending),
        "success" => Ok(EventLogStatus::Success),
        "failed" => Ok(EventLogStatus::Failed),
        other => Err(Error::StorageUnavailable(format!(
            "unrecognized event_log.status value: {other}"
        ))),
    }
}

impl TryFrom<EventLogRow> for EventLogRecord {
    type Error = Error;

    fn try_from(row: EventLogRow) -> Result<Self> {
        Ok(EventLogRecord {
            id: row.id,
            tenant_id: row.tenant_id,
            provider: row.provider,
            name: row.name,
            request_id: row.request_id,
            state_id: row.state_id,
            installation_id: row.installation_id,
            namespace_id: row.namespace_id,
            namespace_name: row.namespace_name,
            topic: row.topic,
            rule_id: row.rule_id,
            rule_when: row.rule_when,
            drivers: row.drivers,
            matched: row.matched,
            status: status_from_str(&row.status)?,
            error_message: row.error_message,
            headers: row.headers.0,
            body: row.body,
            transformed_body: row.transformed_body,
            body_hash: row.body_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

const COLUMNS: &str = "id, tenant_id, provider, name, request_id, state_id, installation_id, \
    namespace_id, namespace_name, topic, rule_id, rule_when, drivers, matched, status, \
    error_message, headers, body, transformed_body, body_hash, created_at, updated_at";

fn resolve_tenant(ctx: &Ctx, filter: &EventLogFilter) -> String {
    filter
        .tenant_id
        .clone()
        .unwrap_or_else(|| ctx.tenant_id().to_string())
}

/// Append every optional `EventLogFilter` field as an `AND` clause onto a
/// builder whose query already selects `WHERE tenant_id = <bound>`, the way
/// the teacher's `audit_handlers::list_events` grows its `WHERE` clause one
/// optional predicate at a time.
fn push_filter_clauses(builder: &mut QueryBuilder<'_, Postgres>, filter: &EventLogFilter) {
    if let Some(v) = &filter.provider {
        builder.push(" AND provider = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.name {
        builder.push(" AND name = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.topic {
        builder.push(" AND topic = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.request_id {
        builder.push(" AND request_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.state_id {
        builder.push(" AND state_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.installation_id {
        builder.push(" AND installation_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.namespace_id {
        builder.push(" AND namespace_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.namespace_name {
        builder.push(" AND namespace_name = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.rule_id {
        builder.push(" AND rule_id = ").push_bind(v.clone());
    }
    if let Some(v) = &filter.rule_when {
        builder.push(" AND rule_when = ").push_bind(v.clone());
    }
    if let Some(v) = filter.matched {
        builder.push(" AND matched = ").push_bind(v);
    }
    if let Some(v) = filter.start {
        builder.push(" AND created_at >= ").push_bind(v);
    }
    if let Some(v) = filter.end {
        builder.push(" AND created_at <= ").push_bind(v);
    }
}

fn breakdown_column(group_by: GroupBy) -> &'static str {
    match group_by {
        GroupBy::Provider => "provider",
        GroupBy::Event => "name",
        GroupBy::RuleId => "COALESCE(rule_id, '')",
        GroupBy::RuleWhen => "COALESCE(rule_when, '')",
        GroupBy::Topic => "COALESCE(topic, '')",
        GroupBy::NamespaceId => "COALESCE(namespace_id, '')",
        GroupBy::NamespaceName => "COALESCE(namespace_name, '')",
        GroupBy::InstallationId => "COALESCE(installation_id, '')",
    }
}

fn bucket_expr(interval: TimeInterval) -> &'static str {
    match interval {
        TimeInterval::Hour => "hour",
        TimeInterval::Day => "day",
        TimeInterval::Week => "week",
    }
}

pub struct PgEventLogStore {
    pool: PgPool,
}

impl PgEventLogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLogStore for PgEventLogStore {
    async fn create(&self, _ctx: &Ctx, records: Vec<EventLogRecord>) -> Result<()> {
        for record in records {
            let query = format!(
                "INSERT INTO event_log ({COLUMNS})
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, now(), now())"
            );
            sqlx::query(&query)
                .bind(&record.id)
                .bind(&record.tenant_id)
                .bind(&record.provider)
                .bind(&record.name)
                .bind(&record.request_id)
                .bind(&record.state_id)
                .bind(&record.installation_id)
                .bind(&record.namespace_id)
                .bind(&record.namespace_name)
                .bind(&record.topic)
                .bind(&record.rule_id)
                .bind(&record.rule_when)
                .bind(&record.drivers)
                .bind(record.matched)
                .bind(status_to_str(record.status))
                .bind(&record.error_message)
                .bind(Json(&record.headers))
                .bind(&record.body)
                .bind(&record.transformed_body)
                .bind(&record.body_hash)
                .execute(&self.pool)
                .await
                .map_err(storage_err)?;
        }
        Ok(())
    }

    async fn get(&self, ctx: &Ctx, id: &str) -> Result<Option<EventLogRecord>> {
        let query = format!("SELECT {COLUMNS} FROM event_log WHERE tenant_id = $1 AND id = $2");
        let row: Option<EventLogRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(EventLogRecord::try_from).transpose()
    }

    async fn list(&self, ctx: &Ctx, filter: EventLogFilter) -> Result<Vec<EventLogRecord>> {
        let tenant = resolve_tenant(ctx, &filter);
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {COLUMNS} FROM event_log WHERE tenant_id = "));
        builder.push_bind(tenant);
        push_filter_clauses(&mut builder, &filter);
        builder.push(" ORDER BY created_at DESC");
        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            builder.push(" OFFSET ").push_bind(offset as i64);
        }
        let rows = builder
            .build_query_as::<EventLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(EventLogRecord::try_from).collect()
    }

    async fn find_by_request_id(
        &self,
        ctx: &Ctx,
        provider: &str,
        request_id: &str,
    ) -> Result<Vec<EventLogRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM event_log WHERE tenant_id = $1 AND provider = $2 AND request_id = $3"
        );
        let rows: Vec<EventLogRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(provider)
            .bind(request_id)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(EventLogRecord::try_from).collect()
    }

    async fn update_status(
        &self,
        ctx: &Ctx,
        id: &str,
        status: EventLogStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE event_log SET status = $1, error_message = $2, updated_at = now()
             WHERE tenant_id = $3 AND id = $4",
        )
        .bind(status_to_str(status))
        .bind(error_message)
        .bind(ctx.tenant_id())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn analytics(&self, ctx: &Ctx, filter: EventLogFilter) -> Result<AnalyticsSummary> {
        let tenant = resolve_tenant(ctx, &filter);
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "SELECT COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE matched) AS matched, \
                    COUNT(*) FILTER (WHERE status = 'success') AS success, \
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending \
             FROM event_log WHERE tenant_id = ",
        );
        builder.push_bind(tenant);
        push_filter_clauses(&mut builder, &filter);
        let row = builder
            .build()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(AnalyticsSummary {
            total: row.try_get::<i64, _>("total").map_err(storage_err)? as u64,
            matched: row.try_get::<i64, _>("matched").map_err(storage_err)? as u64,
            success: row.try_get::<i64, _>("success").map_err(storage_err)? as u64,
            failed: row.try_get::<i64, _>("failed").map_err(storage_err)? as u64,
            pending: row.try_get::<i64, _>("pending").map_err(storage_err)? as u64,
        })
    }

    async fn timeseries(
        &self,
        ctx: &Ctx,
        filter: EventLogFilter,
        interval: TimeInterval,
    ) -> Result<Vec<TimeseriesPoint>> {
        let tenant = resolve_tenant(ctx, &filter);
        let bucket = bucket_expr(interval);
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT date_trunc('{bucket}', created_at) AS bucket_start, \
                    COUNT(*) AS total, \
                    COUNT(*) FILTER (WHERE matched) AS matched, \
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed \
             FROM event_log WHERE tenant_id = "
        ));
        builder.push_bind(tenant);
        push_filter_clauses(&mut builder, &filter);
        builder.push(" GROUP BY bucket_start ORDER BY bucket_start");
        let rows = builder.build().fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.into_iter()
            .map(|row| {
                Ok(TimeseriesPoint {
                    bucket_start: row.try_get("bucket_start").map_err(storage_err)?,
                    total: row.try_get::<i64, _>("total").map_err(storage_err)? as u64,
                    matched: row.try_get::<i64, _>("matched").map_err(storage_err)? as u64,
                    failed: row.try_get::<i64, _>("failed").map_err(storage_err)? as u64,
                })
            })
            .collect()
    }

    async fn breakdown(&self, ctx: &Ctx, query: BreakdownQuery) -> Result<Vec<BreakdownRow>> {
        let tenant = resolve_tenant(ctx, &query.filter);
        let col = breakdown_column(query.group_by);
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {col} AS key, COUNT(*) AS cnt, \
                    COUNT(*) FILTER (WHERE matched) AS matched_cnt, \
                    COUNT(*) FILTER (WHERE status = 'failed') AS failed_cnt \
             FROM event_log WHERE tenant_id = "
        ));
        builder.push_bind(tenant);
        push_filter_clauses(&mut builder, &query.filter);
        builder.push(format!(" GROUP BY {col} ORDER BY "));
        let sort_col = match query.sort {
            BreakdownSort::Count => "cnt",
            BreakdownSort::Matched => "matched_cnt",
            BreakdownSort::Failed => "failed_cnt",
        };
        builder.push(sort_col);
        builder.push(if query.desc { " DESC" } else { " ASC" });
        builder.push(" LIMIT ").push_bind(query.page_size as i64);
        builder.push(" OFFSET ").push_bind(query.offset as i64);
        let rows = builder.build().fetch_all(&self.pool).await.map_err(storage_err)?;
        rows.into_iter()
            .map(|row| {
                Ok(BreakdownRow {
                    key: row.try_get("key").map_err(storage_err)?,
                    count: row.try_get::<i64, _>("cnt").map_err(storage_err)? as u64,
                    matched: row.try_get::<i64, _>("matched_cnt").map_err(storage_err)? as u64,
                    failed: row.try_get::<i64, _>("failed_cnt").map_err(storage_err)? as u64,
                    avg_latency_ms: None,
                })
            })
            .collect()
    }
}
