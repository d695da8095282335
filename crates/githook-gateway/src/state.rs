use std::sync::Arc;

use githook_core::{
    Ctx, DriverStore, Error as CoreError, EventLogStore, InstallationStore, NamespaceStore,
    ProviderInstanceStore, Result, RuleStore,
};
use githook_drivers::DriverCache;
use githook_rule_engine::RuleEngine;
use githook_security::TenantCache;
use githook_storage_mem::{
    MemDriverStore, MemEventLogStore, MemInstallationStore, MemNamespaceStore,
    MemProviderInstanceStore, MemRuleStore,
};
use githook_storage_pg::{
    connect, run_migrations, PgDriverStore, PgEventLogStore, PgInstallationStore,
    PgNamespaceStore, PgProviderInstanceStore, PgRuleStore,
};
use tracing::info;

use crate::config::GatewayConfig;
use crate::metrics::GatewayMetrics;

/// Everything a request handler needs: the storage backends (trait
/// objects, so the Pg/Mem choice is made once at boot), the shared rule
/// engine and driver cache, and config/metrics.
#[derive(Clone)]
pub struct AppState {
    pub installations: Arc<dyn InstallationStore>,
    pub namespaces: Arc<dyn NamespaceStore>,
    pub rules: Arc<dyn RuleStore>,
    pub drivers: Arc<dyn DriverStore>,
    pub provider_instances: Arc<dyn ProviderInstanceStore>,
    pub event_log: Arc<dyn EventLogStore>,
    pub rule_engine: Arc<RuleEngine>,
    pub driver_cache: Arc<DriverCache>,
    pub config: Arc<GatewayConfig>,
    pub metrics: Arc<GatewayMetrics>,
    /// Per-tenant strict-mode flag last set via a rule mutation (spec §4.3
    /// GLOSSARY "Strict mode"); the core has no per-rule storage for this,
    /// so the gateway remembers it for the next `RuleEngine::update`.
    rule_strict: Arc<TenantCache<bool>>,
    rule_engine_warm: Arc<TenantCache<()>>,
}

impl AppState {
    pub async fn from_config(config: GatewayConfig, metrics: GatewayMetrics) -> Result<Self> {
        let (installations, namespaces, rules, drivers, provider_instances, event_log): (
            Arc<dyn InstallationStore>,
            Arc<dyn NamespaceStore>,
            Arc<dyn RuleStore>,
            Arc<dyn DriverStore>,
            Arc<dyn ProviderInstanceStore>,
            Arc<dyn EventLogStore>,
        ) = if let Some(database_url) = &config.database_url {
            info!("connecting to Postgres storage backend");
            let pool = connect(database_url).await?;
            run_migrations(&pool).await?;
            (
                Arc::new(PgInstallationStore::new(pool.clone())),
                Arc::new(PgNamespaceStore::new(pool.clone())),
                Arc::new(PgRuleStore::new(pool.clone())),
                Arc::new(PgDriverStore::new(pool.clone())),
                Arc::new(PgProviderInstanceStore::new(pool.clone())),
                Arc::new(PgEventLogStore::new(pool)),
            )
        } else {
            info!("using in-memory storage backend (no DATABASE_URL set)");
            (
                Arc::new(MemInstallationStore::new()),
                Arc::new(MemNamespaceStore::new()),
                Arc::new(MemRuleStore::new()),
                Arc::new(MemDriverStore::new()),
                Arc::new(MemProviderInstanceStore::new()),
                Arc::new(MemEventLogStore::new()),
            )
        };

        Ok(Self {
            installations,
            namespaces,
            rules,
            drivers,
            provider_instances,
            event_log,
            rule_engine: Arc::new(RuleEngine::new()),
            driver_cache: Arc::new(DriverCache::new()),
            config: Arc::new(config),
            metrics: Arc::new(metrics),
            rule_strict: Arc::new(TenantCache::new()),
            rule_engine_warm: Arc::new(TenantCache::new()),
        })
    }

    /// Reload `tenant_id`'s rule set from storage and reinstall it in the
    /// engine, remembering whichever `strict` flag applies (spec §4.3
    /// `Update(rules, strict, tenant_id, logger)`).
    pub async fn reload_rules(&self, ctx: &Ctx, strict: Option<bool>) -> Result<()> {
        let tenant = ctx.tenant_id();
        if let Some(strict) = strict {
            self.rule_strict.set(tenant, strict);
        }
        let effective_strict = self.rule_strict.get(tenant).unwrap_or(false);
        let rules = self.rules.list(ctx).await?;
        self.rule_engine
            .update(tenant, &rules, effective_strict)
            .map_err(|e| CoreError::InvalidArgument(e.to_string()))?;
        self.rule_engine_warm.set(tenant, ());
        Ok(())
    }

    /// Reload `tenant_id`'s driver cache entry from storage (spec §4.4
    /// `DriverCache.Refresh`).
    pub async fn reload_drivers(&self, ctx: &Ctx) -> Result<()> {
        self.driver_cache
            .refresh(ctx, &*self.drivers, self.config.dlq_driver.as_deref())
            .await
    }

    /// Ensure the rule engine and driver cache both have a snapshot for
    /// this tenant before dispatch runs, lazily warming on first contact
    /// after a cold start (no admin mutation yet called `reload_*` for
    /// this tenant since boot).
    pub async fn ensure_tenant_warm(&self, ctx: &Ctx) -> Result<()> {
        if self.rule_engine_warm.get(ctx.tenant_id()).is_none() {
            self.reload_rules(ctx, None).await?;
        }
        if self.driver_cache.publisher_for(ctx.tenant_id()).is_none() {
            self.reload_drivers(ctx).await?;
        }
        Ok(())
    }
}
