use async_trait::async_trait;
use chrono::{DateTime, Utc};
use githook_core::{Ctx, Error, InstallRecord, InstallationStore, Provider, Result};
use sqlx::PgPool;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct InstallationRow {
    id: String,
    tenant_id: String,
    provider: String,
    account_id: String,
    account_name: String,
    installation_id: String,
    provider_instance_key: String,
    enterprise_id: Option<String>,
    enterprise_slug: Option<String>,
    enterprise_name: Option<String>,
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    metadata_json: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InstallationRow> for InstallRecord {
    type Error = Error;

    fn try_from(row: InstallationRow) -> Result<Self> {
        Ok(InstallRecord {
            id: row.id,
            tenant_id: row.tenant_id,
            provider: Provider::from_str(&row.provider)?,
            account_id: row.account_id,
            account_name: row.account_name,
            installation_id: row.installation_id,
            provider_instance_key: row.provider_instance_key,
            enterprise_id: row.enterprise_id,
            enterprise_slug: row.enterprise_slug,
            enterprise_name: row.enterprise_name,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
            metadata_json: row.metadata_json,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

pub struct PgInstallationStore {
    pool: PgPool,
}

impl PgInstallationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InstallationStore for PgInstallationStore {
    async fn list(
        &self,
        ctx: &Ctx,
        provider: Provider,
        account_id: Option<&str>,
    ) -> Result<Vec<InstallRecord>> {
        let rows: Vec<InstallationRow> = sqlx::query_as(
            "SELECT id, tenant_id, provider, account_id, account_name, installation_id,
                    provider_instance_key, enterprise_id, enterprise_slug, enterprise_name,
                    access_token, refresh_token, expires_at, metadata_json, created_at, updated_at
             FROM installations
             WHERE tenant_id = $1 AND provider = $2 AND ($3::text IS NULL OR account_id = $3)",
        )
        .bind(ctx.tenant_id())
        .bind(provider.to_string())
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(InstallRecord::try_from).collect()
    }

    async fn get_by_installation_id(
        &self,
        ctx: &Ctx,
        provider: Provider,
        installation_id: &str,
    ) -> Result<Option<InstallRecord>> {
        let row: Option<InstallationRow> = sqlx::query_as(
            "SELECT id, tenant_id, provider, account_id, account_name, installation_id,
                    provider_instance_key, enterprise_id, enterprise_slug, enterprise_name,
                    access_token, refresh_token, expires_at, metadata_json, created_at, updated_at
             FROM installations
             WHERE tenant_id = $1 AND provider = $2 AND installation_id = $3
             LIMIT 1",
        )
        .bind(ctx.tenant_id())
        .bind(provider.to_string())
        .bind(installation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(InstallRecord::try_from).transpose()
    }

    async fn get_by_installation_id_and_instance_key(
        &self,
        ctx: &Ctx,
        provider: Provider,
        installation_id: &str,
        instance_key: &str,
    ) -> Result<Option<InstallRecord>> {
        let row: Option<InstallationRow> = sqlx::query_as(
            "SELECT id, tenant_id, provider, account_id, account_name, installation_id,
                    provider_instance_key, enterprise_id, enterprise_slug, enterprise_name,
                    access_token, refresh_token, expires_at, metadata_json, created_at, updated_at
             FROM installations
             WHERE tenant_id = $1 AND provider = $2 AND installation_id = $3 AND provider_instance_key = $4",
        )
        .bind(ctx.tenant_id())
        .bind(provider.to_string())
        .bind(installation_id)
        .bind(instance_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(InstallRecord::try_from).transpose()
    }

    async fn upsert(&self, ctx: &Ctx, record: InstallRecord) -> Result<InstallRecord> {
        let row: InstallationRow = sqlx::query_as(
            "INSERT INTO installations
                (id, tenant_id, provider, account_id, account_name, installation_id,
                 provider_instance_key, enterprise_id, enterprise_slug, enterprise_name,
                 access_token, refresh_token, expires_at, metadata_json, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now(), now())
             ON CONFLICT (tenant_id, provider, installation_id, provider_instance_key)
             DO UPDATE SET
                account_id = EXCLUDED.account_id,
                account_name = EXCLUDED.account_name,
                enterprise_id = EXCLUDED.enterprise_id,
                enterprise_slug = EXCLUDED.enterprise_slug,
                enterprise_name = EXCLUDED.enterprise_name,
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at,
                metadata_json = EXCLUDED.metadata_json,
                updated_at = now()
             RETURNING id, tenant_id, provider, account_id, account_name, installation_id,
                       provider_instance_key, enterprise_id, enterprise_slug, enterprise_name,
                       access_token, refresh_token, expires_at, metadata_json, created_at, updated_at",
        )
        .bind(&record.id)
        .bind(ctx.tenant_id())
        .bind(record.provider.to_string())
        .bind(&record.account_id)
        .bind(&record.account_name)
        .bind(&record.installation_id)
        .bind(&record.provider_instance_key)
        .bind(&record.enterprise_id)
        .bind(&record.enterprise_slug)
        .bind(&record.enterprise_name)
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.expires_at)
        .bind(&record.metadata_json)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        InstallRecord::try_from(row)
    }

    async fn delete(
        &self,
        ctx: &Ctx,
        provider: Provider,
        account_id: &str,
        installation_id: &str,
        instance_key: &str,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM installations
             WHERE tenant_id = $1 AND provider = $2 AND account_id = $3
               AND installation_id = $4 AND provider_instance_key = $5",
        )
        .bind(ctx.tenant_id())
        .bind(provider.to_string())
        .bind(account_id)
        .bind(installation_id)
        .bind(instance_key)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
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
        let result = sqlx::query(
            "UPDATE installations SET provider_instance_key = $1, updated_at = now()
             WHERE tenant_id = $2 AND provider = $3 AND provider_instance_key = $4",
        )
        .bind(new_key)
        .bind(tenant_id)
        .bind(provider.to_string())
        .bind(old_key)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }
}
