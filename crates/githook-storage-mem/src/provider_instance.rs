use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use githook_core::{Ctx, Provider, ProviderInstanceRecord, ProviderInstanceStore, Result};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemProviderInstanceStore {
    rows: Arc<Mutex<Vec<ProviderInstanceRecord>>>,
}

impl MemProviderInstanceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderInstanceStore for MemProviderInstanceStore {
    async fn get(
        &self,
        ctx: &Ctx,
        provider: Provider,
        hash: &str,
    ) -> Result<Option<ProviderInstanceRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| r.tenant_id == ctx.tenant_id() && r.provider == provider && r.hash == hash)
            .cloned())
    }

    async fn get_by_hash(
        &self,
        provider: Provider,
        hash: &str,
    ) -> Result<Option<ProviderInstanceRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| r.provider == provider && r.hash == hash)
            .cloned())
    }

    async fn list(&self, ctx: &Ctx, provider: Provider) -> Result<Vec<ProviderInstanceRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id() && r.provider == provider)
            .cloned()
            .collect())
    }

    async fn upsert(
        &self,
        ctx: &Ctx,
        mut record: ProviderInstanceRecord,
    ) -> Result<ProviderInstanceRecord> {
        let mut rows = self.rows.lock().await;
        record.tenant_id = ctx.tenant_id().to_string();
        record.updated_at = Utc::now();
        match rows
            .iter_mut()
            .find(|r| r.tenant_id == record.tenant_id && r.provider == record.provider && r.hash == record.hash)
        {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(record)
    }

    async fn delete(&self, ctx: &Ctx, provider: Provider, hash: &str) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| !(r.tenant_id == ctx.tenant_id() && r.provider == provider && r.hash == hash));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str) -> ProviderInstanceRecord {
        ProviderInstanceRecord {
            provider: Provider::Github,
            hash: hash.into(),
            tenant_id: "acme".into(),
            config_json: "{}".into(),
            redirect_base_url: None,
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = MemProviderInstanceStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("h1")).await.unwrap();
        assert!(store.get(&ctx, Provider::Github, "h1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn list_is_provider_scoped() {
        let store = MemProviderInstanceStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("h1")).await.unwrap();
        assert_eq!(store.list(&ctx, Provider::Github).await.unwrap().len(), 1);
        assert_eq!(store.list(&ctx, Provider::Gitlab).await.unwrap().len(), 0);
    }
}
