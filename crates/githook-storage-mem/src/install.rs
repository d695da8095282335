use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use githook_core::{Ctx, InstallRecord, InstallationStore, Provider, Result};
use tokio::sync::Mutex;

/// In-memory `InstallationStore`, keyed by (tenant, provider, installation
/// id, provider instance key) the way the teacher's `InMemoryRateLimiter`
/// wraps its state in `Arc<Mutex<..>>` for cheap cloning across handlers.
#[derive(Clone, Default)]
pub struct MemInstallationStore {
    rows: Arc<Mutex<Vec<InstallRecord>>>,
}

impl MemInstallationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InstallationStore for MemInstallationStore {
    async fn list(
        &self,
        ctx: &Ctx,
        provider: Provider,
        account_id: Option<&str>,
    ) -> Result<Vec<InstallRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id() && r.provider == provider)
            .filter(|r| account_id.map_or(true, |id| r.account_id == id))
            .cloned()
            .collect())
    }

    async fn get_by_installation_id(
        &self,
        ctx: &Ctx,
        provider: Provider,
        installation_id: &str,
    ) -> Result<Option<InstallRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| {
                r.tenant_id == ctx.tenant_id()
                    && r.provider == provider
                    && r.installation_id == installation_id
            })
            .cloned())
    }

    async fn get_by_installation_id_and_instance_key(
        &self,
        ctx: &Ctx,
        provider: Provider,
        installation_id: &str,
        instance_key: &str,
    ) -> Result<Option<InstallRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| {
                r.tenant_id == ctx.tenant_id()
                    && r.provider == provider
                    && r.installation_id == installation_id
                    && r.provider_instance_key == instance_key
            })
            .cloned())
    }

    async fn upsert(&self, ctx: &Ctx, mut record: InstallRecord) -> Result<InstallRecord> {
        let mut rows = self.rows.lock().await;
        record.tenant_id = ctx.tenant_id().to_string();
        record.updated_at = Utc::now();
        match rows.iter_mut().find(|r| {
            r.tenant_id == record.tenant_id
                && r.provider == record.provider
                && r.installation_id == record.installation_id
                && r.provider_instance_key == record.provider_instance_key
        }) {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(record)
    }

    async fn delete(
        &self,
        ctx: &Ctx,
        provider: Provider,
        account_id: &str,
        installation_id: &str,
        instance_key: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| {
            !(r.tenant_id == ctx.tenant_id()
                && r.provider == provider
                && r.account_id == account_id
                && r.installation_id == installation_id
                && r.provider_instance_key == instance_key)
        });
        Ok(())
    }

    async fn update_provider_instance_key(
        &self,
        _ctx: &Ctx,
        provider: Provider,
        old_key: &str,
        new_key: &str,
        tenant_id: &str,
    ) -> Result<u64> {
        let mut rows = self.rows.lock().await;
        let mut count = 0u64;
        for row in rows
            .iter_mut()
            .filter(|r| r.tenant_id == tenant_id && r.provider == provider && r.provider_instance_key == old_key)
        {
            row.provider_instance_key = new_key.to_string();
            row.updated_at = Utc::now();
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;

    fn record(installation_id: &str, instance_key: &str) -> InstallRecord {
        InstallRecord {
            id: "i1".into(),
            tenant_id: "acme".into(),
            provider: Provider::Github,
            account_id: "42".into(),
            account_name: "acme-org".into(),
            installation_id: installation_id.into(),
            provider_instance_key: instance_key.into(),
            enterprise_id: None,
            enterprise_slug: None,
            enterprise_name: None,
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: None,
            metadata_json: Value::Null,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = MemInstallationStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("99", "default")).await.unwrap();
        let found = store
            .get_by_installation_id(&ctx, Provider::Github, "99")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_full_composite() {
        let store = MemInstallationStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("99", "default")).await.unwrap();
        store.upsert(&ctx, record("99", "default")).await.unwrap();
        let all = store.list(&ctx, Provider::Github, None).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_matching_row_only() {
        let store = MemInstallationStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("99", "default")).await.unwrap();
        store.upsert(&ctx, record("100", "default")).await.unwrap();
        store
            .delete(&ctx, Provider::Github, "42", "99", "default")
            .await
            .unwrap();
        let all = store.list(&ctx, Provider::Github, None).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].installation_id, "100");
    }

    #[tokio::test]
    async fn update_provider_instance_key_rewrites_matching_rows() {
        let store = MemInstallationStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("99", "old")).await.unwrap();
        let updated = store
            .update_provider_instance_key(&ctx, Provider::Github, "old", "new", "acme")
            .await
            .unwrap();
        assert_eq!(updated, 1);
        let found = store
            .get_by_installation_id_and_instance_key(&ctx, Provider::Github, "99", "new")
            .await
            .unwrap();
        assert!(found.is_some());
    }
}
