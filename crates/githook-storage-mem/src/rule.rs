use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use githook_core::{Ctx, Result, Rule, RuleStore};
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct MemRuleStore {
    rows: Arc<Mutex<Vec<Rule>>>,
}

impl MemRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for MemRuleStore {
    async fn get(&self, ctx: &Ctx, id: &str) -> Result<Option<Rule>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .find(|r| r.tenant_id == ctx.tenant_id() && r.id == id)
            .cloned())
    }

    async fn list(&self, ctx: &Ctx) -> Result<Vec<Rule>> {
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.tenant_id == ctx.tenant_id())
            .cloned()
            .collect())
    }

    async fn upsert(&self, ctx: &Ctx, mut rule: Rule) -> Result<Rule> {
        let mut rows = self.rows.lock().await;
        rule.tenant_id = ctx.tenant_id().to_string();
        rule.updated_at = Utc::now();
        match rows
            .iter_mut()
            .find(|r| r.tenant_id == rule.tenant_id && r.id == rule.id)
        {
            Some(existing) => *existing = rule.clone(),
            None => rows.push(rule.clone()),
        }
        Ok(rule)
    }

    async fn delete(&self, ctx: &Ctx, id: &str) -> Result<()> {
        let mut rows = self.rows.lock().await;
        rows.retain(|r| !(r.tenant_id == ctx.tenant_id() && r.id == id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(id: &str) -> Rule {
        Rule {
            id: id.into(),
            tenant_id: "acme".into(),
            when: "action == \"opened\"".into(),
            emit: vec!["pr.opened".into()],
            driver_id: "d1".into(),
            transform_js: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_then_list_is_tenant_scoped() {
        let store = MemRuleStore::new();
        let acme = Ctx::new("acme");
        let other = Ctx::new("other-co");
        store.upsert(&acme, rule("r1")).await.unwrap();
        assert_eq!(store.list(&acme).await.unwrap().len(), 1);
        assert_eq!(store.list(&other).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn delete_removes_rule() {
        let store = MemRuleStore::new();
        let ctx = Ctx::new("acme");
        store.upsert(&ctx, rule("r1")).await.unwrap();
        store.delete(&ctx, "r1").await.unwrap();
        assert!(store.get(&ctx, "r1").await.unwrap().is_none());
    }
}
