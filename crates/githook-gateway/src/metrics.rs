use anyhow::Result;
use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};

/// Gateway-wide Prometheus registry, following `GatewayMetrics` in the
/// reference `integration-gateway`: one registry, a handful of counters and
/// histograms, rendered on `/metrics` via `TextEncoder`.
#[derive(Clone)]
pub struct GatewayMetrics {
    registry: Registry,
    webhook_requests: IntCounterVec,
    publish_total: IntCounterVec,
    dispatch_latency: Histogram,
    event_log_writes: IntCounterVec,
}

impl GatewayMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let webhook_requests = IntCounterVec::new(
            Opts::new(
                "githooks_webhook_requests_total",
                "Webhook ingress requests grouped by provider and result",
            ),
            &["provider", "result"],
        )?;
        let publish_total = IntCounterVec::new(
            Opts::new(
                "githooks_publish_total",
                "Dispatch publishes grouped by driver and result",
            ),
            &["driver", "result"],
        )?;
        let event_log_writes = IntCounterVec::new(
            Opts::new(
                "githooks_event_log_writes_total",
                "Event log rows written grouped by status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(webhook_requests.clone()))?;
        registry.register(Box::new(publish_total.clone()))?;
        registry.register(Box::new(event_log_writes.clone()))?;

        let dispatch_latency = Histogram::with_opts(HistogramOpts::new(
            "githooks_dispatch_latency_seconds",
            "Time spent evaluating a tenant's rule set and publishing every match for one event",
        ))?;
        registry.register(Box::new(dispatch_latency.clone()))?;

        Ok(Self {
            registry,
            webhook_requests,
            publish_total,
            dispatch_latency,
            event_log_writes,
        })
    }

    pub fn record_webhook_request(&self, provider: &str, result: &str) {
        self.webhook_requests.with_label_values(&[provider, result]).inc();
    }

    pub fn record_publish(&self, driver: &str, result: &str) {
        self.publish_total.with_label_values(&[driver, result]).inc();
    }

    pub fn observe_dispatch_latency(&self, secs: f64) {
        self.dispatch_latency.observe(secs);
    }

    pub fn record_event_log_write(&self, status: &str) {
        self.event_log_writes.with_label_values(&[status]).inc();
    }

    pub fn render(&self) -> Result<Response> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            )
            .body(Body::from(buffer))?;
        Ok(response)
    }
}
