use async_trait::async_trait;
use chrono::{DateTime, Utc};
use githook_core::{Ctx, DriverName, DriverRecord, DriverStore, Error, Result};
use sqlx::PgPool;

#[derive(sqlx::FromRow)]
struct DriverRow {
    id: String,
    tenant_id: String,
    name: String,
    config_json: String,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<DriverRow> for DriverRecord {
    fn from(row: DriverRow) -> Self {
        DriverRecord {
            id: row.id,
            tenant_id: row.tenant_id,
            name: DriverName::from(row.name.as_str()),
            config_json: row.config_json,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

const COLUMNS: &str = "id, tenant_id, name, config_json, enabled, created_at, updated_at";

pub struct PgDriverStore {
    pool: PgPool,
}

impl PgDriverStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DriverStore for PgDriverStore {
    async fn get(&self, ctx: &Ctx, name: &str) -> Result<Option<DriverRecord>> {
        let query = format!("SELECT {COLUMNS} FROM drivers WHERE tenant_id = $1 AND name = $2");
        let row: Option<DriverRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(DriverRecord::from))
    }

    async fn get_by_id(&self, ctx: &Ctx, id: &str) -> Result<Option<DriverRecord>> {
        let query = format!("SELECT {COLUMNS} FROM drivers WHERE tenant_id = $1 AND id = $2");
        let row: Option<DriverRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(row.map(DriverRecord::from))
    }

    async fn list(&self, ctx: &Ctx) -> Result<Vec<DriverRecord>> {
        let query = format!("SELECT {COLUMNS} FROM drivers WHERE tenant_id = $1 ORDER BY created_at");
        let rows: Vec<DriverRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows.into_iter().map(DriverRecord::from).collect())
    }

    async fn upsert(&self, ctx: &Ctx, record: DriverRecord) -> Result<DriverRecord> {
        let query = format!(
            "INSERT INTO drivers ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, now(), now())
             ON CONFLICT (tenant_id, id) DO UPDATE SET
                name = EXCLUDED.name,
                config_json = EXCLUDED.config_json,
                enabled = EXCLUDED.enabled,
                updated_at = now()
             RETURNING {COLUMNS}"
        );
        let row: DriverRow = sqlx::query_as(&query)
            .bind(&record.id)
            .bind(ctx.tenant_id())
            .bind(record.name.to_string())
            .bind(&record.config_json)
            .bind(record.enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(DriverRecord::from(row))
    }

    async fn delete(&self, ctx: &Ctx, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM drivers WHERE tenant_id = $1 AND name = $2")
            .bind(ctx.tenant_id())
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
