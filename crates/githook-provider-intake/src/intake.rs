use serde_json::Value;

use githook_core::{
    Ctx, Error as CoreError, Event, EventLogStore, HeaderMultimap, InstallationStore,
    NamespaceStore, Provider,
};

use crate::auth::{verify_signature, ProviderAuth};
use crate::error::Result;
use crate::headers::{delivery_header, event_header};
use crate::identity::{bitbucket_identity, bitbucket_repo_id, gitlab_identity, gitlab_repo_id, github_identity, github_repo_id, PayloadIdentity};
use crate::{github};

/// Default `max_body_bytes` when a deployment leaves it unconfigured (spec
/// §4.6).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Everything one call to `intake` needs about the inbound HTTP request.
/// Transport-specific extraction (axum `HeaderMap`/`Bytes` -> this shape)
/// is the gateway's job; this crate stays transport-agnostic.
pub struct IntakeRequest<'a> {
    pub provider: Provider,
    pub raw_body: Vec<u8>,
    pub headers: HeaderMultimap,
    pub auth: ProviderAuth<'a>,
    pub max_body_bytes: usize,
}

/// The result of one intake attempt. `event` is `None` only when this
/// delivery id was already processed (spec §4.6 "an intake is idempotent on
/// retry of the same delivery id").
pub struct IntakeOutcome {
    pub event: Option<Event>,
    pub idempotent_replay: bool,
}

/// Run the full provider-agnostic intake skeleton (spec §4.6): size cap,
/// signature verification, event name extraction, installation resolution,
/// GitHub system rules, idempotency, and `Event` construction. Does not
/// invoke the dispatch pipeline or write the event log row itself — both
/// are the caller's responsibility so this crate has no dependency on
/// either.
pub async fn intake(
    ctx: &Ctx,
    req: IntakeRequest<'_>,
    installations: &dyn InstallationStore,
    namespaces: &dyn NamespaceStore,
    event_log: &dyn EventLogStore,
) -> Result<IntakeOutcome> {
    if req.raw_body.len() > req.max_body_bytes {
        return Err(CoreError::BodyTooLarge(req.raw_body.len()).into());
    }

    verify_signature(req.provider, &req.headers, &req.raw_body, &req.auth)?;

    let name = req
        .headers
        .get_first(event_header(req.provider))
        .map(str::to_string)
        .ok_or_else(|| CoreError::UnrecognizedEvent("missing event-name header".into()))?;

    let request_id = req
        .headers
        .get_first(delivery_header(req.provider))
        .map(str::to_string)
        .unwrap_or_else(githook_crypto::random_hex_id);

    let provider_str = req.provider.to_string();
    let existing = event_log
        .find_by_request_id(ctx, &provider_str, &request_id)
        .await?;
    if !existing.is_empty() {
        return Ok(IntakeOutcome {
            event: None,
            idempotent_replay: true,
        });
    }

    let payload: Value = serde_json::from_slice(&req.raw_body)
        .map_err(|_| CoreError::InvalidArgument("malformed JSON body".into()))?;

    let identity = resolve_identity(req.provider, &payload).ok_or_else(|| {
        CoreError::FailedPrecondition(
            "unable to resolve installation identity from payload".into(),
        )
    })?;

    let install = installations
        .get_by_installation_id(ctx, req.provider, &identity.installation_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("installation {}", identity.installation_id)))?;

    if install.account_id != identity.account_id {
        return Err(CoreError::PermissionDenied("state_id mismatch".into()).into());
    }

    if req.provider == Provider::Github {
        github::apply_system_rules(ctx, &name, &payload, &install, namespaces, installations).await?;
    }

    let mut event = Event::new(
        provider_str,
        name,
        request_id,
        install.tenant_id.clone(),
        req.raw_body,
        req.headers,
    );
    event.installation_id = Some(install.installation_id.clone());
    event.state_id = Some(install.account_id.clone());
    event.provider_instance_key = Some(install.provider_instance_key.clone());

    if let Some(repo_id) = resolve_repo_id(req.provider, event.raw_object()) {
        if let Some(ns) = namespaces
            .get(ctx, req.provider, &repo_id, &install.provider_instance_key)
            .await?
        {
            event.namespace_id = Some(ns.repo_id.clone());
            event.namespace_name = Some(ns.full_name.clone());
        }
    }
    event.flatten_into_data();

    Ok(IntakeOutcome {
        event: Some(event),
        idempotent_replay: false,
    })
}

fn resolve_identity(provider: Provider, payload: &Value) -> Option<PayloadIdentity> {
    match provider {
        Provider::Github => github_identity(payload),
        Provider::Gitlab => gitlab_identity(payload),
        Provider::Bitbucket => bitbucket_identity(payload),
    }
}

fn resolve_repo_id(provider: Provider, payload: &Value) -> Option<String> {
    match provider {
        Provider::Github => github_repo_id(payload),
        Provider::Gitlab => gitlab_repo_id(payload),
        Provider::Bitbucket => bitbucket_repo_id(payload),
    }
}
