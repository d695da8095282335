use async_trait::async_trait;
use chrono::{DateTime, Utc};
use githook_core::{Ctx, Error, NamespaceFilter, NamespaceRecord, NamespaceStore, Provider, Result};
use sqlx::PgPool;
use std::str::FromStr;

#[derive(sqlx::FromRow)]
struct NamespaceRow {
    tenant_id: String,
    provider: String,
    repo_id: String,
    account_id: String,
    installation_id: String,
    provider_instance_key: String,
    owner: String,
    repo_name: String,
    full_name: String,
    visibility: String,
    default_branch: String,
    http_url: String,
    ssh_url: String,
    webhooks_enabled: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<NamespaceRow> for NamespaceRecord {
    type Error = Error;

    fn try_from(row: NamespaceRow) -> Result<Self> {
        Ok(NamespaceRecord {
            tenant_id: row.tenant_id,
            provider: Provider::from_str(&row.provider)?,
            repo_id: row.repo_id,
            account_id: row.account_id,
            installation_id: row.installation_id,
            provider_instance_key: row.provider_instance_key,
            owner: row.owner,
            repo_name: row.repo_name,
            full_name: row.full_name,
            visibility: row.visibility,
            default_branch: row.default_branch,
            http_url: row.http_url,
            ssh_url: row.ssh_url,
            webhooks_enabled: row.webhooks_enabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    Error::StorageUnavailable(e.to_string())
}

const COLUMNS: &str = "tenant_id, provider, repo_id, account_id, installation_id, \
    provider_instance_key, owner, repo_name, full_name, visibility, default_branch, \
    http_url, ssh_url, webhooks_enabled, created_at, updated_at";

pub struct PgNamespaceStore {
    pool: PgPool,
}

impl PgNamespaceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NamespaceStore for PgNamespaceStore {
    async fn list(&self, ctx: &Ctx, filter: NamespaceFilter) -> Result<Vec<NamespaceRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM namespaces
             WHERE tenant_id = $1
               AND ($2::text IS NULL OR provider = $2)
               AND ($3::text IS NULL OR installation_id = $3)
               AND ($4::text IS NULL OR provider_instance_key = $4)"
        );
        let rows: Vec<NamespaceRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(filter.provider.map(|p| p.to_string()))
            .bind(filter.installation_id)
            .bind(filter.provider_instance_key)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(NamespaceRecord::try_from).collect()
    }

    async fn get(
        &self,
        ctx: &Ctx,
        provider: Provider,
        repo_id: &str,
        instance_key: &str,
    ) -> Result<Option<NamespaceRecord>> {
        let query = format!(
            "SELECT {COLUMNS} FROM namespaces
             WHERE tenant_id = $1 AND provider = $2 AND repo_id = $3 AND provider_instance_key = $4"
        );
        let row: Option<NamespaceRow> = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(provider.to_string())
            .bind(repo_id)
            .bind(instance_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(NamespaceRecord::try_from).transpose()
    }

    async fn upsert(&self, ctx: &Ctx, record: NamespaceRecord) -> Result<NamespaceRecord> {
        let query = format!(
            "INSERT INTO namespaces ({COLUMNS})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now(), now())
             ON CONFLICT (tenant_id, provider, repo_id, provider_instance_key)
             DO UPDATE SET
                account_id = EXCLUDED.account_id,
                installation_id = EXCLUDED.installation_id,
                owner = EXCLUDED.owner,
                repo_name = EXCLUDED.repo_name,
                full_name = EXCLUDED.full_name,
                visibility = EXCLUDED.visibility,
                default_branch = EXCLUDED.default_branch,
                http_url = EXCLUDED.http_url,
                ssh_url = EXCLUDED.ssh_url,
                webhooks_enabled = EXCLUDED.webhooks_enabled,
                updated_at = now()
             RETURNING {COLUMNS}"
        );
        let row: NamespaceRow = sqlx::query_as(&query)
            .bind(ctx.tenant_id())
            .bind(record.provider.to_string())
            .bind(&record.repo_id)
            .bind(&record.account_id)
            .bind(&record.installation_id)
            .bind(&record.provider_instance_key)
            .bind(&record.owner)
            .bind(&record.repo_name)
            .bind(&record.full_name)
            .bind(&record.visibility)
            .bind(&record.default_branch)
            .bind(&record.http_url)
            .bind(&record.ssh_url)
            .bind(record.webhooks_enabled)
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        NamespaceRecord::try_from(row)
    }

    async fn delete(
        &self,
        ctx: &Ctx,
        provider: Provider,
        repo_id: &str,
        instance_key: &str,
    ) -> Result<()> {
        sqlx::query(
            "DELETE FROM namespaces
             WHERE tenant_id = $1 AND provider = $2 AND repo_id = $3 AND provider_instance_key = $4",
        )
        .bind(ctx.tenant_id())
        .bind(provider.to_string())
        .bind(repo_id)
        .bind(instance_key)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}
