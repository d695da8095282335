use async_trait::async_trait;
use chrono::{DateTime, Utc};
use githook_core::{Ctx, Error, Result, Rule, RuleStore};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct RuleRow {
    id: String,
    tenant_id: String,
    when_expr: String,
    emit: Vec<String>,
    driver_id: String,
    transform_js: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RuleRow> for Rule {
    fn from(row: RuleRow) -> Self {
        Rule {
            id: row.id,
            tenant_id: row.tenant_id,
            when: row.when_expr,
            emit: row.emit,
            driver_id: row.driver_id,
            transform_js: row.transform_js,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

const COLUMNS: &str = "id, tenant_id, when_expr, emit, driver_id, transform_js, created_at, updated_at";

pub struct PgRuleStore {
    pool: PgPool,
}

impl PgRuleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RuleStore for PgRuleStore {
    async fn get(&self, ctx: &Ctx, id: &str) -> Result<Option<Rule>> {
        let query = format!("SELECT {COLUMNS} FROM rules WHERE tenant_id = $1 AND id = $2");
        let row: Option<RuleRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(Rule::from))
    }

    async fn list(&self, ctx: &Ctx) -> Result<Vec<Rule>> {
        let query = format!("SELECT {COLUMNS} FROM rules WHERE tenant_id = $1 ORDER BY created_at");
        let rows: Vec<RuleRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().map(Rule::from).collect())
    }

    async fn upsert(&self, ctx: &Ctx, rule: Rule) -> Result<Rule> {
        let query = format!(
            "INSERT INTO rules ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, now(), now())
             ON CONFLICT (tenant_id, id) DO UPDATE SET
                when_expr = EXCLUDED.when_expr,
                emit = EXCLUDED.emit,
                driver_id = EXCLUDED.driver_id,
                transform_js = EXCLUDED.transform_js,
                updated_at = now()
             RETURNING {COLUMNS}"
        );
        let row: RuleRow = sqlx::query_as(&query)
            .bind(&rule.id)
            .bind(ctx.tenant_id())
            .bind(&rule.when)
            .bind(&rule.emit)
            .bind(&rule.driver_id)
            .bind(&rule.transform_js)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(Rule::from(row))
    }

    async fn delete(&self, ctx: &Ctx, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM rules WHERE tenant_id = $1 AND id = $2")
            .bind(ctx.tenant_id())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
