use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use githook_core::{Ctx, DriverRecord, DriverStore, Result};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemDriverStore {
    rows: Arc<Mutex<Vec<DriverRecord>>>,
}

impl MemDriverStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DriverStore for MemDriverStore {
    async fn get(&self, ctx: &Ctx, name: &str) -> Result<Option<DriverRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| r.tenant_id == ctx.tenant_id() && r.name.to_string() == name)
            .cloned())
    }

    async fn get_by_id(&self, ctx: &Ctx, id: &str) -> Result<Option<DriverRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| r.tenant_id == ctx.tenant_id() && r.id == id)
            .cloned())
    }

    async fn list(&self, ctx: &Ctx) -> Result<Vec<DriverRecord>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id())
            .cloned()
            .collect())
    }

    async fn upsert(&self, ctx: &Ctx, mut record: DriverRecord) -> Result<DriverRecord> {
        let mut rows = self.rows.lock().await;
        record.tenant_id = ctx.tenant_id().to_string();
        record.updated_at = Utc::now();
        match rows
            .iter_mut()
            .find(|r| r.tenant_id == record.tenant_id && r.id == record.id)
        {
            Some(existing) => *existing = record.clone(),
            None => rows.push(record.clone()),
        }
        Ok(record)
    }

    async fn delete(&self, ctx: &Ctx, name: &str) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| !(r.tenant_id == ctx.tenant_id() && r.name.to_string() == name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use githook_core::DriverName;

    fn record(id: &str) -> DriverRecord {
        DriverRecord {
            id: id.into(),
            tenant_id: "acme".into(),
            name: DriverName::Amqp,
            config_json: "{}".into(),
            enabled: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_get_by_name_and_id() {
        let store = MemDriverStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("d1")).await.unwrap();
        assert!(store.get(&ctx, "amqp").await.unwrap().is_some());
        assert!(store.get_by_id(&ctx, "d1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn delete_by_name_removes_row() {
        let store = MemDriverStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, record("d1")).await.unwrap();
        store.delete(&ctx, "amqp").await.unwrap();
        assert!(store.get_by_id(&ctx, "d1").await.unwrap().is_none());
    }
}
