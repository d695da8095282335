use std::str::FromStr;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;
use tracing::{instrument, warn};

use githook_core::{Ctx, Error as CoreError, HeaderMultimap, Provider};
use githook_http_errors::ApiResult;
use githook_provider_intake::{intake, IntakeRequest, ProviderAuth};

use crate::state::AppState;

/// The shape of `ProviderInstanceRecord.config_json` this gateway writes
/// and reads (spec §3 leaves the document untyped; §4.6 needs exactly one
/// of these two fields depending on provider).
#[derive(Deserialize)]
struct WebhookAuthConfig {
    secret: Option<String>,
    token: Option<String>,
}

fn header_multimap(headers: &HeaderMap) -> HeaderMultimap {
    let mut out = HeaderMultimap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            out.insert(name.as_str(), v);
        }
    }
    out
}

/// `POST /webhooks/{provider}/{hash}` (spec §6, adapted from the literal
/// `/webhooks/{github|gitlab|bitbucket}` path: the hash segment is what
/// resolves which tenant's `ProviderInstanceRecord` this delivery belongs
/// to, since intake has no tenant context until that lookup succeeds).
#[instrument(skip(state, headers, body), fields(provider = %provider_path))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    Path((provider_path, hash)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> ApiResult<StatusCode> {
    let provider = Provider::from_str(&provider_path)?;

    let instance = state
        .provider_instances
        .get_by_hash(provider, &hash)
        .await?
        .ok_or_else(|| CoreError::NotFound(format!("provider instance {hash}")))?;

    if !instance.enabled {
        return Err(CoreError::FailedPrecondition(format!(
            "provider instance {hash} is disabled"
        ))
        .into());
    }

    let auth_config: WebhookAuthConfig = serde_json::from_str(&instance.config_json)
        .map_err(|_| CoreError::FailedPrecondition("provider instance config_json is malformed".into()))?;

    let ctx = Ctx::new(instance.tenant_id.clone());
    let raw_body = body.to_vec();
    let req_headers = header_multimap(&headers);

    let outcome = match provider {
        Provider::Github | Provider::Bitbucket => {
            let secret = auth_config
                .secret
                .as_deref()
                .ok_or(CoreError::SignatureMismatch)?;
            let req = IntakeRequest {
                provider,
                raw_body,
                headers: req_headers,
                auth: ProviderAuth::Hmac { secret: secret.as_bytes() },
                max_body_bytes: state.config.max_body_bytes,
            };
            intake(&ctx, req, &*state.installations, &*state.namespaces, &*state.event_log)
                .await
                .map_err(CoreError::from)?
        }
        Provider::Gitlab => {
            let token = auth_config.token.as_deref().ok_or(CoreError::SignatureMismatch)?;
            let req = IntakeRequest {
                provider,
                raw_body,
                headers: req_headers,
                auth: ProviderAuth::Token { token },
                max_body_bytes: state.config.max_body_bytes,
            };
            intake(&ctx, req, &*state.installations, &*state.namespaces, &*state.event_log)
                .await
                .map_err(CoreError::from)?
        }
    };

    if outcome.idempotent_replay {
        state.metrics.record_webhook_request(&provider.to_string(), "idempotent_replay");
        return Ok(StatusCode::OK);
    }

    let mut event = outcome.event.expect("non-replay intake always returns an event");

    state.ensure_tenant_warm(&ctx).await?;
    let mux = state
        .driver_cache
        .publisher_for(ctx.tenant_id())
        .ok_or(CoreError::NoPublishersAvailable)?;

    let dispatch_start = Instant::now();
    let records = githook_dispatch::dispatch(&ctx, &mut event, &state.rule_engine, &*state.drivers, &mux).await?;
    state.metrics.observe_dispatch_latency(dispatch_start.elapsed().as_secs_f64());

    for record in &records {
        let result = if record.status == githook_core::EventLogStatus::Failed {
            "failed"
        } else {
            "success"
        };
        state.metrics.record_event_log_write(result);
        for driver in &record.drivers {
            state.metrics.record_publish(driver, result);
        }
    }

    if let Err(err) = state.event_log.create(&ctx, records).await {
        warn!(tenant = %ctx.tenant_id(), error = %err, "failed to persist event log rows");
        return Err(err.into());
    }

    state.metrics.record_webhook_request(&provider.to_string(), "ingested");
    Ok(StatusCode::OK)
}
