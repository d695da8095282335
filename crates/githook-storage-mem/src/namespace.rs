use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use githook_core::{Ctx, NamespaceFilter, NamespaceRecord, NamespaceStore, Provider, Result};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemNamespaceStore {
    rows: Arc<Mutex<Vec<NamespaceRecord>>>,
}

impl MemNamespaceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NamespaceStore for MemNamespaceStore {
    async fn list(&self, ctx: &Ctx, filter: NamespaceFilter) -> Result<Vec<NamespaceRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id())
            .filter(|r| filter.provider.map_or(true, |p| r.provider == p))
            .filter(|r| {
                filter
                    .installation_id
                    .as_deref()
                    .map_or(true, |id| r.installation_id == id)
            })
            .filter(|r| {
                filter
                    .provider_instance_key
                    .as_deref()
                    .map_or(true, |key| r.provider_instance_key == key)
            })
            .cloned()
            .collect())
    }

    async fn get(
        &self,
        ctx: &Ctx,
        provider: Provider,
        repo_id: &str,
        instance_key: &str,
    ) -> Result<Option<NamespaceRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| {
                r.tenant_id == ctx.tenant_id()
                    && r.provider == provider
                    && r.repo_id == repo_id
                    && r.provider_instance_key == instance_key
            })
            .cloned())
    }

    async fn upsert(&self, ctx: &Ctx, mut record: NamespaceRecord) -> Result<NamespaceRecord> {
        let mut rows = self.rows.lock().await;
        record.tenant_id = ctx.tenant_id().to_string();
        record.updated_at = Utc::now();
        match rows.iter_mut().find(|r| {
            r.tenant_id == record.tenant_id
                && r.provider == record.provider
                && r.repo_id == record.repo_id
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
        repo_id: &str,
        instance_key: &str,
    ) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| {
            !(r.tenant_id == ctx.tenant_id()
                && r.provider == provider
                && r.repo_id == repo_id
                && r.provider_instance_key == instance_key)
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(repo_id: &str) -> NamespaceRecord {
        NamespaceRecord {
            tenant_id: "acme".into(),
            provider: Provider::Github,
            repo_id: repo_id.into(),
            account_id: "42".into(),
            installation_id: "99".into(),
            provider_instance_key: "default".into(),
            owner: "acme-org".into(),
            repo_name: "widgets".into(),
            full_name: "acme-org/widgets".into(),
            visibility: "private".into(),
            default_branch: "main".into(),
            http_url: "https://example.test/acme-org/widgets".into(),
            ssh_url: "git@example.test:acme-org/widgets.git".into(),
            webhooks_enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = MemNamespaceStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("repo-1")).await.unwrap();
        let found = store
            .get(&ctx, Provider::Github, "repo-1", "default")
            .await
            .unwrap();
        assert_eq!(found.unwrap().full_name, "acme-org/widgets");
    }

    #[tokio::test]
    async fn delete_removes_only_matching_row() {
        let store = MemNamespaceStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("repo-1")).await.unwrap();
        store.upsert(&ctx, record("repo-2")).await.unwrap();
        store
            .delete(&ctx, Provider::Github, "repo-1", "default")
            .await
            .unwrap();
        let remaining = store.list(&ctx, NamespaceFilter::default()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].repo_id, "repo-2");
    }
}
