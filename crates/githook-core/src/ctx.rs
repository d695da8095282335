use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// The reserved bucket every empty/blank tenant id collapses to (spec §4.1).
pub const GLOBAL_TENANT: &str = "global";

/// The default tenant used when a caller supplies none.
pub const DEFAULT_TENANT: &str = "default";

/// Normalize a raw tenant id the way every entry point into the core must:
/// blank becomes the reserved `"global"` bucket.
pub fn normalize_tenant(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        GLOBAL_TENANT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// A request-scoped context carrying the tenant id, an optional deadline and
/// a cooperative cancellation signal, threaded through every core call that
/// can suspend (storage, publisher construction/publish, signature
/// verification of streamed bodies, JS transform execution, retry delays —
/// spec §5).
#[derive(Clone)]
pub struct Ctx {
    tenant_id: String,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl Ctx {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: normalize_tenant(&tenant_id.into()),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn background() -> Self {
        Self::new(DEFAULT_TENANT)
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn child_token(&self) -> CancellationToken {
        self.cancel.child_token()
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_expired(&self) -> bool {
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Check cancellation/deadline before a suspension point, returning the
    /// appropriate taxonomy error (spec §7) instead of proceeding.
    pub fn check(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(Error::Canceled);
        }
        if self.is_expired() {
            return Err(Error::DeadlineExceeded);
        }
        Ok(())
    }

    /// Race an arbitrary future against cancellation/deadline, honoring
    /// §5's "every blocking or potentially-blocking operation... must
    /// observe cancellation."
    pub async fn run<F, T>(&self, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = T>,
    {
        self.check()?;
        if let Some(deadline) = self.deadline {
            tokio::select! {
                _ = self.cancel.cancelled() => Err(Error::Canceled),
                _ = tokio::time::sleep_until(deadline.into()) => Err(Error::DeadlineExceeded),
                out = fut => Ok(out),
            }
        } else {
            tokio::select! {
                _ = self.cancel.cancelled() => Err(Error::Canceled),
                out = fut => Ok(out),
            }
        }
    }
}

impl Default for Ctx {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_tenant_collapses_to_global() {
        assert_eq!(normalize_tenant(""), GLOBAL_TENANT);
        assert_eq!(normalize_tenant("   "), GLOBAL_TENANT);
        assert_eq!(normalize_tenant("acme"), "acme");
    }

    #[tokio::test]
    async fn canceled_context_short_circuits() {
        let ctx = Ctx::new("acme");
        ctx.cancel();
        let result = ctx.run(async { 1 }).await;
        assert!(matches!(result, Err(Error::Canceled)));
    }

    #[tokio::test]
    async fn uncontended_context_runs_future() {
        let ctx = Ctx::new("acme");
        let result = ctx.run(async { 42 }).await.unwrap();
        assert_eq!(result, 42);
    }
}
