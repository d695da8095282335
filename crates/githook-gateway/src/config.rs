use anyhow::Result;
use std::env;

/// Runtime configuration for the gateway binary (spec §6, ambient
/// Configuration section). Follows the reference `GatewayConfig::from_env`
/// idiom: required vars are fetched with `.context(...)`, optional vars
/// parse-and-default, durations get a `.max(floor)` clamp.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// `None` selects the in-memory storage backend (local dev / tests);
    /// `Some` connects to Postgres and runs migrations on boot.
    pub database_url: Option<String>,
    pub max_body_bytes: usize,
    /// Driver name to mirror failed publishes to (spec §4.4); the core's
    /// `DriverRecord` carries no DLQ flag, so this is deployment config.
    pub dlq_driver: Option<String>,
    pub driver_cache_refresh_secs: u64,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let max_body_bytes = env::var("GITHOOKS_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(githook_provider_intake::DEFAULT_MAX_BODY_BYTES)
            .max(1024);
        let dlq_driver = env::var("GITHOOKS_DLQ_DRIVER")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let driver_cache_refresh_secs = env::var("GITHOOKS_DRIVER_CACHE_REFRESH_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60)
            .max(10);

        Ok(Self {
            host,
            port,
            database_url,
            max_body_bytes,
            dlq_driver,
            driver_cache_refresh_secs,
        })
    }
}
