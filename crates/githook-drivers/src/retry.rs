use std::time::Duration;

use githook_core::{Ctx, Error, Result};
use tracing::warn;

/// `{max_attempts, base_delay, max_delay}` (spec §4.4 "Retry policy").
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub const DEFAULT: RetryPolicy = RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(5),
    };

    /// Per-driver `retry_count` overrides `publish_retry.attempts` from the
    /// base config (spec §4.4).
    pub fn with_override(self, retry_count: Option<u32>) -> Self {
        match retry_count {
            Some(n) => RetryPolicy {
                max_attempts: n,
                ..self
            },
            None => self,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1u32 << attempt.min(16));
        scaled.min(self.max_delay)
    }
}

/// Run `op` under `policy`, retrying with exponential backoff on failure.
/// When `max_attempts <= 1` the operation runs exactly once and is not
/// retried (spec §4.4).
pub async fn run_with_retry<F, Fut, T>(ctx: &Ctx, policy: RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    if policy.max_attempts <= 1 {
        return ctx.run(op()).await?;
    }
    let mut last_err = Error::PublishFailed("retry policy exhausted with zero attempts".into());
    for attempt in 0..policy.max_attempts {
        ctx.check()?;
        match ctx.run(op()).await? {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, error = %err, "publish attempt failed, retrying");
                last_err = err;
                if attempt + 1 < policy.max_attempts {
                    let delay = policy.delay_for(attempt);
                    ctx.run(tokio::time::sleep(delay)).await?;
                }
            }
        }
    }
    Err(last_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let ctx = Ctx::background();
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let result: Result<u32> = run_with_retry(&ctx, policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Error::PublishFailed("not yet".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_attempt_policy_does_not_retry() {
        let ctx = Ctx::background();
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
        };
        let result: Result<u32> = run_with_retry(&ctx, policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::PublishFailed("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
