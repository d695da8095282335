use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use githook_core::{Ctx, InstallRecord, InstallationStore, NamespaceRecord, NamespaceStore, Provider, Result};

use crate::identity::json_id;

/// GitHub-only system rules (spec §4.6 step v): `installation` and
/// `installation_repositories` deliveries mutate `NamespaceStore` as a
/// side effect of intake, and an `installation` delivery with
/// `action: "deleted"` removes the installation row itself, ahead of the
/// normal rule-engine dispatch. These events never produce rule matches of
/// their own interest beyond this.
pub async fn apply_system_rules(
    ctx: &Ctx,
    event_name: &str,
    payload: &Value,
    install: &InstallRecord,
    namespaces: &dyn NamespaceStore,
    installations: &dyn InstallationStore,
) -> Result<()> {
    match event_name {
        "installation" => {
            let action = payload.get("action").and_then(Value::as_str).unwrap_or_default();
            if action == "deleted" {
                installations
                    .delete(
                        ctx,
                        Provider::Github,
                        &install.account_id,
                        &install.installation_id,
                        &install.provider_instance_key,
                    )
                    .await?;
                return Ok(());
            }
            if let Some(repos) = payload.get("repositories").and_then(Value::as_array) {
                for repo in repos {
                    upsert_namespace(ctx, repo, install, namespaces).await?;
                }
            }
        }
        "installation_repositories" => {
            if let Some(added) = payload.get("repositories_added").and_then(Value::as_array) {
                for repo in added {
                    upsert_namespace(ctx, repo, install, namespaces).await?;
                }
            }
            if let Some(removed) = payload.get("repositories_removed").and_then(Value::as_array) {
                for repo in removed {
                    if let Some(id) = repo.get("id").and_then(json_id) {
                        namespaces
                            .delete(ctx, Provider::Github, &id, &install.provider_instance_key)
                            .await?;
                    }
                }
            }
        }
        other => {
            debug!(event = other, "no system rule for this github event");
        }
    }
    Ok(())
}

/// The `installation`/`installation_repositories` repo entries only carry
/// `{id, name, full_name, private}`; everything else defaults to what a
/// later sync (not modeled here) would backfill.
async fn upsert_namespace(
    ctx: &Ctx,
    repo: &Value,
    install: &InstallRecord,
    namespaces: &dyn NamespaceStore,
) -> Result<()> {
    let Some(repo_id) = repo.get("id").and_then(json_id) else {
        return Ok(());
    };
    let full_name = repo
        .get("full_name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let repo_name = repo
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let owner = full_name
        .split_once('/')
        .map(|(o, _)| o.to_string())
        .unwrap_or_else(|| install.account_name.clone());
    let visibility = match repo.get("private").and_then(Value::as_bool) {
        Some(true) => "private",
        Some(false) => "public",
        None => "unknown",
    }
    .to_string();
    let now = Utc::now();
    namespaces
        .upsert(
            ctx,
            NamespaceRecord {
                tenant_id: install.tenant_id.clone(),
                provider: Provider::Github,
                repo_id,
                account_id: install.account_id.clone(),
                installation_id: install.installation_id.clone(),
                provider_instance_key: install.provider_instance_key.clone(),
                owner,
                repo_name,
                full_name,
                visibility,
                default_branch: String::new(),
                http_url: String::new(),
                ssh_url: String::new(),
                webhooks_enabled: true,
                created_at: now,
                updated_at: now,
            },
        )
        .await?;
    Ok(())
}
