use async_trait::async_trait;
use chrono::{DateTime, Utc};
use githook_core::{Ctx, Error, Provider, ProviderInstanceRecord, ProviderInstanceStore, Result};
use sqlx::PgPool;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct ProviderInstanceRow {
    provider: String,
    hash: String,
    tenant_id: String,
    config_json: String,
    redirect_base_url: Option<String>,
    enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProviderInstanceRow> for ProviderInstanceRecord {
    type Error = Error;

    fn try_from(row: ProviderInstanceRow) -> Result<Self> {
        Ok(ProviderInstanceRecord {
            provider: Provider::from_str(&row.provider)?,
            hash: row.hash,
            tenant_id: row.tenant_id,
            config_json: row.config_json,
            redirect_base_url: row.redirect_base_url,
            enabled: row.enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

const COLUMNS: &str =
    "provider, hash, tenant_id, config_json, redirect_base_url, enabled, created_at, updated_at";

pub struct PgProviderInstanceStore {
    pool: PgPool,
}

impl PgProviderInstanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderInstanceStore for PgProviderInstanceStore {
    async fn get(
        &self,
        ctx: &Ctx,
        provider: Provider,
        hash: &str,
    ) -> Result<Option<ProviderInstanceRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM provider_instances WHERE tenant_id = $1 AND provider = $2 AND hash = $3"
        );
        let row: Option<ProviderInstanceRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(provider.to_string())
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(ProviderInstanceRecord::try_from).transpose()
    }

    async fn get_by_hash(
        &self,
        provider: Provider,
        hash: &str,
    ) -> Result<Option<ProviderInstanceRecord>> {
        let query = format!("SELECT {COLUMNS} FROM provider_instances WHERE provider = $1 AND hash = $2");
        let row: Option<ProviderInstanceRow> = sqlx::query_as(&query)
            .bind(provider.to_string())
            .bind(hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(ProviderInstanceRecord::try_from).transpose()
    }

    async fn list(&self, ctx: &Ctx, provider: Provider) -> Result<Vec<ProviderInstanceRecord>> {
        let query =
            format!("SELECT {COLUMNS} FROM provider_instances WHERE tenant_id = $1 AND provider = $2");
        let rows: Vec<ProviderInstanceRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(provider.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(ProviderInstanceRecord::try_from).collect()
    }

    async fn upsert(
        &self,
        ctx: &Ctx,
        record: ProviderInstanceRecord,
    ) -> Result<ProviderInstanceRecord> {
        let query = format!(
            "INSERT INTO provider_instances ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, now(), now())
             ON CONFLICT (provider, hash) DO UPDATE SET
                config_json = EXCLUDED.config_json,
                redirect_base_url = EXCLUDED.redirect_base_url,
                enabled = EXCLUDED.enabled,
                updated_at = now()
             RETURNING {COLUMNS}"
        );
        let row: ProviderInstanceRow = sqlx::query_as(&query)
            .bind(record.provider.to_string())
            .bind(&record.hash)
            .bind(ctx.tenant_id())
            .bind(&record.config_json)
            .bind(&record.redirect_base_url)
            .bind(record.enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        ProviderInstanceRecord::try_from(row)
    }

    async fn delete(&self, ctx: &Ctx, provider: Provider, hash: &str) -> Result<()> {
        sqlx::query("DELETE FROM provider_instances WHERE tenant_id = $1 AND provider = $2 AND hash = $3")
            .bind(ctx.tenant_id())
            .bind(provider.to_string())
            .bind(hash)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }
}
