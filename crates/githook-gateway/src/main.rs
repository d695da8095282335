use std::net::SocketAddr;

use axum::extract::State;
use axum::http::{HeaderName, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use githook_core::Ctx;
use githook_gateway::admin_handlers::{
    analytics, breakdown, create_provider_instance, delete_driver, delete_provider_instance,
    delete_rule, get_event_log, get_rule, list_drivers, list_event_log, list_namespaces,
    list_provider_instances, list_rules, replay, timeseries, update_event_log_status,
    upsert_driver, upsert_rule,
};
use githook_gateway::webhook_handlers::handle_webhook;
use githook_gateway::{AppState, GatewayConfig, GatewayMetrics};

async fn healthz() -> &'static str {
    "ok"
}

/// `/readyz`: touches the storage backend so a misconfigured or unreachable
/// database takes this instance out of rotation rather than accepting
/// webhooks it cannot persist.
async fn readyz(State(state): State<AppState>) -> Response {
    match state.event_log.list(&Ctx::background(), Default::default()).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(err) => {
            warn!(error = %err, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable").into_response()
        }
    }
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(resp) => resp,
        Err(err) => {
            warn!(error = %err, "failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics unavailable").into_response()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = GatewayConfig::from_env()?;
    let metrics = GatewayMetrics::new()?;
    let host = config.host.clone();
    let port = config.port;
    let state = AppState::from_config(config, metrics).await?;

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            HeaderName::from_static("x-tenant-id"),
            HeaderName::from_static("x-githooks-tenant-id"),
        ]);

    let admin_api = Router::new()
        .route("/rules", post(upsert_rule).get(list_rules))
        .route("/rules/:id", get(get_rule).delete(delete_rule))
        .route("/drivers", post(upsert_driver).get(list_drivers))
        .route("/drivers/:name", delete(delete_driver))
        .route(
            "/provider-instances",
            post(create_provider_instance).get(list_provider_instances),
        )
        .route(
            "/provider-instances/:provider/:hash",
            delete(delete_provider_instance),
        )
        .route("/namespaces", get(list_namespaces))
        .route("/event-log", get(list_event_log))
        .route("/event-log/analytics", get(analytics))
        .route("/event-log/timeseries", get(timeseries))
        .route("/event-log/breakdown", get(breakdown))
        .route("/event-log/:id", get(get_event_log))
        .route("/event-log/:id/status", post(update_event_log_status))
        .route("/event-log/:id/replay", post(replay));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_endpoint))
        .route("/webhooks/:provider/:hash", post(handle_webhook))
        .nest("/admin", admin_api)
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "starting githook-gateway");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
