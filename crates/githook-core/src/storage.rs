use async_trait::async_trait;

use crate::ctx::Ctx;
use crate::driver::DriverRecord;
use crate::error::Result;
use crate::event_log::{
    AnalyticsSummary, BreakdownQuery, BreakdownRow, EventLogFilter, EventLogRecord,
    EventLogStatus, TimeInterval, TimeseriesPoint,
};
use crate::install::InstallRecord;
use crate::namespace::{NamespaceFilter, NamespaceRecord};
use crate::provider_instance::{Provider, ProviderInstanceRecord};
use crate::rule::Rule;

/// Storage contract for OAuth/App installations (spec §4.2).
///
/// Reads that find nothing return `Ok(None)`, never an error — only
/// genuine failures (backend unreachable, uniqueness violations the core
/// expects) surface as `Err`.
#[async_trait]
pub trait InstallationStore: Send + Sync {
    async fn list(
        &self,
        ctx: &Ctx,
        provider: Provider,
        account_id: Option<&str>,
    ) -> Result<Vec<InstallRecord>>;

    async fn get_by_installation_id(
        &self,
        ctx: &Ctx,
        provider: Provider,
        installation_id: &str,
    ) -> Result<Option<InstallRecord>>;

    async fn get_by_installation_id_and_instance_key(
        &self,
        ctx: &Ctx,
        provider: Provider,
        installation_id: &str,
        instance_key: &str,
    ) -> Result<Option<InstallRecord>>;

    async fn upsert(&self, ctx: &Ctx, record: InstallRecord) -> Result<InstallRecord>;

    async fn delete(
        &self,
        ctx: &Ctx,
        provider: Provider,
        account_id: &str,
        installation_id: &str,
        instance_key: &str,
    ) -> Result<()>;

    async fn update_provider_instance_key(
        &self,
        ctx: &Ctx,
        provider: Provider,
        old_key: &str,
        new_key: &str,
        tenant_id: &str,
    ) -> Result<u64>;
}

/// Storage contract for repo/project inventory (spec §4.2).
#[async_trait]
pub trait NamespaceStore: Send + Sync {
    async fn list(&self, ctx: &Ctx, filter: NamespaceFilter) -> Result<Vec<NamespaceRecord>>;

    async fn get(
        &self,
        ctx: &Ctx,
        provider: Provider,
        repo_id: &str,
        instance_key: &str,
    ) -> Result<Option<NamespaceRecord>>;

    async fn upsert(&self, ctx: &Ctx, record: NamespaceRecord) -> Result<NamespaceRecord>;

    async fn delete(
        &self,
        ctx: &Ctx,
        provider: Provider,
        repo_id: &str,
        instance_key: &str,
    ) -> Result<()>;
}

/// Storage contract for rules (spec §4.2). `List` is tenant-scoped via the
/// ambient `Ctx`.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn get(&self, ctx: &Ctx, id: &str) -> Result<Option<Rule>>;
    async fn list(&self, ctx: &Ctx) -> Result<Vec<Rule>>;
    async fn upsert(&self, ctx: &Ctx, rule: Rule) -> Result<Rule>;
    async fn delete(&self, ctx: &Ctx, id: &str) -> Result<()>;
}

/// Storage contract for driver bindings (spec §4.2).
#[async_trait]
pub trait DriverStore: Send + Sync {
    async fn get(&self, ctx: &Ctx, name: &str) -> Result<Option<DriverRecord>>;
    async fn get_by_id(&self, ctx: &Ctx, id: &str) -> Result<Option<DriverRecord>>;
    async fn list(&self, ctx: &Ctx) -> Result<Vec<DriverRecord>>;
    async fn upsert(&self, ctx: &Ctx, record: DriverRecord) -> Result<DriverRecord>;
    async fn delete(&self, ctx: &Ctx, name: &str) -> Result<()>;
}

/// Storage contract for provider instances (spec §4.2).
#[async_trait]
pub trait ProviderInstanceStore: Send + Sync {
    async fn get(
        &self,
        ctx: &Ctx,
        provider: Provider,
        hash: &str,
    ) -> Result<Option<ProviderInstanceRecord>>;

    /// Resolve a provider instance by its globally unique `hash` alone, with
    /// no tenant scoping. Webhook ingress (spec §4.6) receives only
    /// `(provider, hash)` on the wire and must discover `tenant_id` from
    /// this lookup before any tenant-scoped call (including `get` above)
    /// can be made.
    async fn get_by_hash(
        &self,
        provider: Provider,
        hash: &str,
    ) -> Result<Option<ProviderInstanceRecord>>;

    async fn list(&self, ctx: &Ctx, provider: Provider) -> Result<Vec<ProviderInstanceRecord>>;

    async fn upsert(
        &self,
        ctx: &Ctx,
        record: ProviderInstanceRecord,
    ) -> Result<ProviderInstanceRecord>;

    async fn delete(&self, ctx: &Ctx, provider: Provider, hash: &str) -> Result<()>;
}

/// Storage contract for the event log (spec §4.2, §4.5).
#[async_trait]
pub trait EventLogStore: Send + Sync {
    async fn create(&self, ctx: &Ctx, records: Vec<EventLogRecord>) -> Result<()>;
    async fn get(&self, ctx: &Ctx, id: &str) -> Result<Option<EventLogRecord>>;
    async fn list(&self, ctx: &Ctx, filter: EventLogFilter) -> Result<Vec<EventLogRecord>>;

    async fn find_by_request_id(
        &self,
        ctx: &Ctx,
        provider: &str,
        request_id: &str,
    ) -> Result<Vec<EventLogRecord>>;

    async fn update_status(
        &self,
        ctx: &Ctx,
        id: &str,
        status: EventLogStatus,
        error_message: Option<String>,
    ) -> Result<()>;

    async fn analytics(&self, ctx: &Ctx, filter: EventLogFilter) -> Result<AnalyticsSummary>;

    async fn timeseries(
        &self,
        ctx: &Ctx,
        filter: EventLogFilter,
        interval: TimeInterval,
    ) -> Result<Vec<TimeseriesPoint>>;

    async fn breakdown(&self, ctx: &Ctx, query: BreakdownQuery) -> Result<Vec<BreakdownRow>>;
}
