use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use githook_core::{
    Ctx, DriverName, DriverRecord, Error as CoreError, EventLogFilter, EventLogRecord,
    EventLogStatus, GroupBy, NamespaceFilter, Provider, ProviderInstanceRecord, Rule,
};
use githook_eventlog::{breakdown_page, list_page, replay_event_log};
use githook_http_errors::ApiResult;
use githook_security::RequestTenant;

use crate::state::AppState;

fn ctx_for(tenant: &RequestTenant) -> Ctx {
    Ctx::new(tenant.0.clone())
}

// ---------------------------------------------------------------- rules --

#[derive(Deserialize)]
pub struct RuleInput {
    pub id: Option<String>,
    pub when: String,
    pub emit: String,
    pub driver_id: String,
    pub transform_js: Option<String>,
    pub strict: Option<bool>,
}

/// `CreateRule` / `UpdateRule` (spec §6): upsert the row, then rebuild the
/// tenant's compiled rule set so the change takes effect immediately
/// (`RuleEngine.Update`).
pub async fn upsert_rule(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Json(input): Json<RuleInput>,
) -> ApiResult<Json<Rule>> {
    let ctx = ctx_for(&tenant);
    let topic = Rule::normalize_new_emit(&[input.emit])?;
    let id = input
        .id
        .unwrap_or_else(|| Rule::derive_id(&input.when, &[topic.clone()], &input.driver_id));
    let now = Utc::now();
    let rule = Rule {
        id,
        tenant_id: tenant.0.clone(),
        when: input.when,
        emit: vec![topic],
        driver_id: input.driver_id,
        transform_js: input.transform_js,
        created_at: now,
        updated_at: now,
    };
    let saved = state.rules.upsert(&ctx, rule).await?;
    state.reload_rules(&ctx, input.strict).await?;
    info!(tenant = %tenant.0, rule_id = %saved.id, "rule upserted");
    Ok(Json(saved))
}

pub async fn list_rules(
    State(state): State<AppState>,
    tenant: RequestTenant,
) -> ApiResult<Json<Vec<Rule>>> {
    let ctx = ctx_for(&tenant);
    Ok(Json(state.rules.list(&ctx).await?))
}

pub async fn get_rule(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path(id): Path<String>,
) -> ApiResult<Json<Rule>> {
    let ctx = ctx_for(&tenant);
    let rule = state
        .rules
        .get(&ctx, &id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("rule {id}")))?;
    Ok(Json(rule))
}

/// `DeleteRule` (spec §6) → `RuleEngine.Update`.
pub async fn delete_rule(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let ctx = ctx_for(&tenant);
    state.rules.delete(&ctx, &id).await?;
    state.reload_rules(&ctx, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -------------------------------------------------------------- drivers --

#[derive(Deserialize)]
pub struct DriverInput {
    pub id: Option<String>,
    pub name: String,
    pub config_json: String,
    pub enabled: Option<bool>,
}

/// `UpsertDriver` (spec §6) → `DriverCache.Refresh`. Validates
/// `config_json` against the named driver's schema before persisting
/// (spec §4.4 "validation must not connect to the broker").
pub async fn upsert_driver(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Json(input): Json<DriverInput>,
) -> ApiResult<Json<DriverRecord>> {
    let ctx = ctx_for(&tenant);
    let name = DriverName::from(input.name.as_str());
    githook_drivers::parse_and_validate(&name, &input.config_json)
        .map_err(|e| CoreError::InvalidArgument(e.to_string()))?;

    let now = Utc::now();
    let record = DriverRecord {
        id: input.id.unwrap_or_else(|| input.name.clone()),
        tenant_id: tenant.0.clone(),
        name,
        config_json: input.config_json,
        enabled: input.enabled.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    let saved = state.drivers.upsert(&ctx, record).await?;
    state.reload_drivers(&ctx).await?;
    info!(tenant = %tenant.0, driver = %saved.name, "driver upserted");
    Ok(Json(saved))
}

pub async fn list_drivers(
    State(state): State<AppState>,
    tenant: RequestTenant,
) -> ApiResult<Json<Vec<DriverRecord>>> {
    let ctx = ctx_for(&tenant);
    Ok(Json(state.drivers.list(&ctx).await?))
}

/// `DeleteDriver` (spec §6) → `DriverCache.Refresh`.
pub async fn delete_driver(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    let ctx = ctx_for(&tenant);
    state.drivers.delete(&ctx, &name).await?;
    state.reload_drivers(&ctx).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------- provider instances --

#[derive(Deserialize)]
pub struct ProviderInstanceInput {
    pub provider: String,
    pub config_json: String,
    pub redirect_base_url: Option<String>,
    pub enabled: Option<bool>,
}

const HASH_COLLISION_RETRIES: u32 = 5;

/// `UpsertProviderInstance` (spec §6). A fresh instance gets a
/// server-generated `hash` (spec §3: 32 random bytes, hex-encoded, retried
/// up to 5 times on collision); callers never supply one.
pub async fn create_provider_instance(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Json(input): Json<ProviderInstanceInput>,
) -> ApiResult<Json<ProviderInstanceRecord>> {
    let ctx = ctx_for(&tenant);
    let provider: Provider = input.provider.parse()?;

    let mut hash = githook_crypto::random_hex_id();
    for _ in 0..HASH_COLLISION_RETRIES {
        if state.provider_instances.get_by_hash(provider, &hash).await?.is_none() {
            break;
        }
        hash = githook_crypto::random_hex_id();
    }

    let now = Utc::now();
    let record = ProviderInstanceRecord {
        provider,
        hash,
        tenant_id: tenant.0.clone(),
        config_json: input.config_json,
        redirect_base_url: input.redirect_base_url,
        enabled: input.enabled.unwrap_or(true),
        created_at: now,
        updated_at: now,
    };
    let saved = state.provider_instances.upsert(&ctx, record).await?;
    info!(tenant = %tenant.0, provider = %saved.provider, hash = %saved.hash, "provider instance created");
    Ok(Json(saved))
}

#[derive(Deserialize)]
pub struct ListProviderInstancesQuery {
    pub provider: String,
}

pub async fn list_provider_instances(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Query(query): Query<ListProviderInstancesQuery>,
) -> ApiResult<Json<Vec<ProviderInstanceRecord>>> {
    let ctx = ctx_for(&tenant);
    let provider: Provider = query.provider.parse()?;
    Ok(Json(state.provider_instances.list(&ctx, provider).await?))
}

/// `DeleteProviderInstance` (spec §6) → `ProviderInstanceCache.Refresh`.
/// This gateway resolves provider instances by direct point lookup rather
/// than a standing cache (see DESIGN.md), so there is no cache to refresh
/// beyond the storage row itself.
pub async fn delete_provider_instance(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path((provider, hash)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let ctx = ctx_for(&tenant);
    let provider: Provider = provider.parse()?;
    state.provider_instances.delete(&ctx, provider, &hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------- namespaces --

pub async fn list_namespaces(
    State(state): State<AppState>,
    tenant: RequestTenant,
) -> ApiResult<Json<Vec<githook_core::NamespaceRecord>>> {
    let ctx = ctx_for(&tenant);
    Ok(Json(state.namespaces.list(&ctx, NamespaceFilter::default()).await?))
}

// --------------------------------------------------------------- event log --

#[derive(Deserialize, Default)]
pub struct EventLogListQuery {
    pub provider: Option<String>,
    pub name: Option<String>,
    pub topic: Option<String>,
    pub matched: Option<bool>,
    pub page_token: Option<String>,
    pub page_size: Option<u32>,
}

#[derive(Serialize)]
pub struct EventLogPage {
    pub items: Vec<EventLogRecord>,
    pub next_page_token: String,
}

fn filter_from_query(q: &EventLogListQuery) -> EventLogFilter {
    EventLogFilter {
        provider: q.provider.clone(),
        name: q.name.clone(),
        topic: q.topic.clone(),
        matched: q.matched,
        ..Default::default()
    }
}

pub async fn list_event_log(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Query(query): Query<EventLogListQuery>,
) -> ApiResult<Json<EventLogPage>> {
    let ctx = ctx_for(&tenant);
    let filter = filter_from_query(&query);
    let page = list_page(
        &ctx,
        &*state.event_log,
        filter,
        query.page_token.as_deref().unwrap_or(""),
        query.page_size,
    )
    .await?;
    Ok(Json(EventLogPage {
        items: page.items,
        next_page_token: page.next_page_token,
    }))
}

pub async fn get_event_log(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path(id): Path<String>,
) -> ApiResult<Json<EventLogRecord>> {
    let ctx = ctx_for(&tenant);
    let record = state
        .event_log
        .get(&ctx, &id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("event log {id}")))?;
    Ok(Json(record))
}

pub async fn analytics(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Query(query): Query<EventLogListQuery>,
) -> ApiResult<Json<githook_core::AnalyticsSummary>> {
    let ctx = ctx_for(&tenant);
    let filter = filter_from_query(&query);
    Ok(Json(state.event_log.analytics(&ctx, filter).await?))
}

#[derive(Deserialize)]
pub struct TimeseriesQuery {
    #[serde(flatten)]
    pub filter: EventLogListQuery,
    pub interval: String,
}

pub async fn timeseries(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Query(query): Query<TimeseriesQuery>,
) -> ApiResult<Json<Vec<githook_core::TimeseriesPoint>>> {
    let ctx = ctx_for(&tenant);
    let filter = filter_from_query(&query.filter);
    let interval = match query.interval.as_str() {
        "hour" => githook_core::TimeInterval::Hour,
        "day" => githook_core::TimeInterval::Day,
        "week" => githook_core::TimeInterval::Week,
        other => {
            return Err(CoreError::InvalidArgument(format!("unknown interval '{other}'")).into())
        }
    };
    Ok(Json(state.event_log.timeseries(&ctx, filter, interval).await?))
}

#[derive(Deserialize)]
pub struct BreakdownQueryInput {
    #[serde(flatten)]
    pub filter: EventLogListQuery,
    pub group_by: String,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_token: Option<String>,
    #[serde(default)]
    pub include_latency: bool,
}

fn group_by_from_str(s: &str) -> ApiResult<GroupBy> {
    Ok(match s {
        "provider" => GroupBy::Provider,
        "event" => GroupBy::Event,
        "rule_id" => GroupBy::RuleId,
        "rule_when" => GroupBy::RuleWhen,
        "topic" => GroupBy::Topic,
        "namespace_id" => GroupBy::NamespaceId,
        "namespace_name" => GroupBy::NamespaceName,
        "installation_id" => GroupBy::InstallationId,
        other => return Err(CoreError::InvalidArgument(format!("unknown group_by '{other}'")).into()),
    })
}

#[derive(Serialize)]
pub struct BreakdownPage {
    pub items: Vec<githook_core::BreakdownRow>,
    pub next_page_token: String,
}

pub async fn breakdown(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Query(input): Query<BreakdownQueryInput>,
) -> ApiResult<Json<BreakdownPage>> {
    let ctx = ctx_for(&tenant);
    let filter = filter_from_query(&input.filter);
    let group_by = group_by_from_str(&input.group_by)?;
    let sort = match input.sort.as_deref() {
        None | Some("count") => githook_core::BreakdownSort::Count,
        Some("matched") => githook_core::BreakdownSort::Matched,
        Some("failed") => githook_core::BreakdownSort::Failed,
        Some(other) => {
            return Err(CoreError::InvalidArgument(format!("unknown sort '{other}'")).into())
        }
    };
    let query = githook_core::BreakdownQuery {
        filter,
        group_by,
        sort,
        desc: input.desc,
        page_size: input.page_size.unwrap_or(githook_core::DEFAULT_PAGE_SIZE),
        offset: 0,
        include_latency: input.include_latency,
    };
    let page = breakdown_page(
        &ctx,
        &*state.event_log,
        query,
        input.page_token.as_deref().unwrap_or(""),
    )
    .await?;
    Ok(Json(BreakdownPage {
        items: page.items,
        next_page_token: page.next_page_token,
    }))
}

#[derive(Deserialize)]
pub struct UpdateStatusInput {
    pub status: String,
    pub error_message: Option<String>,
}

/// `UpdateEventLogStatus` (spec §6): acts on the event log subsystem
/// directly, no cache to invalidate.
pub async fn update_event_log_status(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path(id): Path<String>,
    Json(input): Json<UpdateStatusInput>,
) -> ApiResult<StatusCode> {
    let ctx = ctx_for(&tenant);
    let status = match input.status.as_str() {
        "pending" => EventLogStatus::Pending,
        "success" => EventLogStatus::Success,
        "failed" => EventLogStatus::Failed,
        other => {
            return Err(CoreError::InvalidArgument(format!("unknown status '{other}'")).into())
        }
    };
    state
        .event_log
        .update_status(&ctx, &id, status, input.error_message)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
pub struct ReplayInput {
    pub driver_name: String,
}

#[derive(Serialize)]
pub struct ReplayOutput {
    pub log_id: String,
    pub topic: String,
    pub driver_name: String,
}

/// `ReplayEventLog(log_id, driver_name)` (spec §4.5, §6).
pub async fn replay(
    State(state): State<AppState>,
    tenant: RequestTenant,
    Path(id): Path<String>,
    Json(input): Json<ReplayInput>,
) -> ApiResult<Json<ReplayOutput>> {
    let ctx = ctx_for(&tenant);
    let outcome = replay_event_log(
        &ctx,
        &id,
        &input.driver_name,
        &*state.event_log,
        &*state.drivers,
        &state.rule_engine,
        &state
            .driver_cache
            .publisher_for(ctx.tenant_id())
            .ok_or(CoreError::NoPublishersAvailable)?,
    )
    .await?;
    Ok(Json(ReplayOutput {
        log_id: outcome.log_id,
        topic: outcome.topic,
        driver_name: outcome.driver_name,
    }))
}
