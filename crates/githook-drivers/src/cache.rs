use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use githook_core::{normalize_tenant, Ctx, DriverStore, Error, Result};
use tracing::{info, warn};

use crate::build::build_publisher;
use crate::mux::PublisherMux;

/// Per-tenant publisher cache: tenant (or `"global"`) -> current mux (spec
/// §4.4 "Per-tenant publisher cache"). `Refresh` is single-writer / many-
/// reader: the new mux is built off-line and swapped in atomically;
/// in-flight readers keep using the prior mux until they re-fetch.
pub struct DriverCache {
    tenants: ArcSwap<HashMap<String, Arc<PublisherMux>>>,
}

impl Default for DriverCache {
    fn default() -> Self {
        Self {
            tenants: ArcSwap::from_pointee(HashMap::new()),
        }
    }
}

impl DriverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached mux for `tenant_id`, if one has been built.
    pub fn publisher_for(&self, tenant_id: &str) -> Option<Arc<PublisherMux>> {
        let tenant = normalize_tenant(tenant_id);
        self.tenants.load().get(&tenant).cloned()
    }

    /// Reload a tenant's driver records from storage and atomically replace
    /// its mux, closing the superseded one. `dlq_driver` names the driver
    /// to mirror failed publishes to, resolved by the caller from service
    /// configuration (the core's `DriverRecord` carries no DLQ flag).
    pub async fn refresh(
        &self,
        ctx: &Ctx,
        store: &dyn DriverStore,
        dlq_driver: Option<&str>,
    ) -> Result<()> {
        let tenant = normalize_tenant(ctx.tenant_id());
        let records = store.list(ctx).await?;
        let mut publishers = HashMap::new();
        let mut default_drivers = Vec::new();
        for record in records.iter().filter(|r| r.enabled) {
            match build_publisher(ctx, record).await {
                Ok(publisher) => {
                    let name = record.name.to_string();
                    default_drivers.push(name.clone());
                    publishers.insert(name, publisher);
                }
                Err(err) => {
                    warn!(driver = %record.name, tenant = %tenant, error = %err, "omitting driver: publisher construction failed");
                }
            }
        }
        let mux = Arc::new(PublisherMux::new(
            publishers,
            default_drivers,
            dlq_driver.map(str::to_string),
        )?);

        let current = self.tenants.load();
        let mut next = HashMap::clone(&**current);
        let previous = next.insert(tenant.clone(), mux);
        self.tenants.store(Arc::new(next));
        info!(tenant = %tenant, "driver cache refreshed");

        if let Some(previous) = previous {
            if let Err(err) = previous.close(ctx).await {
                warn!(tenant = %tenant, error = %err, "closing superseded publisher mux reported errors");
            }
        }
        Ok(())
    }
}

/// Resolve the driver name a `MatchedRule` should publish to, via
/// `DriverStore::get_by_id` (spec §4.3 dispatch step "resolve driver name
/// from rule's driver_id via DriverStore").
pub async fn resolve_driver_name(ctx: &Ctx, store: &dyn DriverStore, driver_id: &str) -> Result<String> {
    let record = store
        .get_by_id(ctx, driver_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("driver {driver_id}")))?;
    if !record.enabled {
        return Err(Error::FailedPrecondition(format!("driver {driver_id} is disabled")));
    }
    Ok(record.name.to_string())
}
