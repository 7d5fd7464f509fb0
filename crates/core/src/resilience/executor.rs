use super::{RateLimitedError, RateLimiter};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_MAX_ATTEMPTS: u32 = 5;
const DEFAULT_BASE_BACKOFF_SECS: u64 = 1;
const DEFAULT_RATE_LIMIT_BACKOFF_SECS: u64 = 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Generic backoff is `base_backoff * 2^attempt`.
    pub base_backoff: Duration,
    /// Backoff after HTTP 429 is `rate_limit_backoff * 2^attempt`.
    pub rate_limit_backoff: Duration,
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: Duration::from_secs(DEFAULT_BASE_BACKOFF_SECS),
            rate_limit_backoff: Duration::from_secs(DEFAULT_RATE_LIMIT_BACKOFF_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Transient,
}

impl RetryPolicy {
    pub fn backoff(&self, kind: FailureKind, attempt: u32) -> Duration {
        let base = match kind {
            FailureKind::RateLimited => self.rate_limit_backoff,
            FailureKind::Transient => self.base_backoff,
        };
        base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

fn rate_limit_of(err: &anyhow::Error) -> Option<&RateLimitedError> {
    err.chain().find_map(|e| e.downcast_ref::<RateLimitedError>())
}

/// Runs one external request at a time under a shared limiter, a timeout, and bounded retry.
#[derive(Debug, Clone)]
pub struct CallExecutor {
    service: &'static str,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl CallExecutor {
    pub fn new(service: &'static str, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            service,
            limiter,
            policy,
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns `None` once every attempt has failed. Never propagates the error.
    pub async fn execute<T, F, Fut>(&self, label: &str, mut work: F) -> Option<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            self.limiter.acquire().await;

            let err = match tokio::time::timeout(self.policy.request_timeout, work()).await {
                Ok(Ok(value)) => {
                    if attempt > 0 {
                        tracing::info!(
                            service = self.service,
                            label,
                            attempt = attempt + 1,
                            "external call succeeded after retry"
                        );
                    }
                    return Some(value);
                }
                Ok(Err(err)) => err,
                Err(_) => anyhow::anyhow!(
                    "request timed out after {}s",
                    self.policy.request_timeout.as_secs()
                ),
            };

            if attempt + 1 == max_attempts {
                tracing::error!(
                    service = self.service,
                    label,
                    attempts = max_attempts,
                    error = %format!("{err:#}"),
                    "external call failed; giving up"
                );
                break;
            }

            let backoff = match rate_limit_of(&err) {
                Some(rl) => {
                    let wait = self.policy.backoff(FailureKind::RateLimited, attempt);
                    rl.retry_after.map_or(wait, |hint| wait.max(hint))
                }
                None => self.policy.backoff(FailureKind::Transient, attempt),
            };

            tracing::warn!(
                service = self.service,
                label,
                attempt = attempt + 1,
                max_attempts,
                rate_limited = rate_limit_of(&err).is_some(),
                ?backoff,
                error = %format!("{err:#}"),
                "external call failed; retrying"
            );
            tokio::time::sleep(backoff).await;
        }

        None
    }

    pub async fn execute_or<T, F, Fut>(&self, label: &str, default: T, work: F) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        self.execute(label, work).await.unwrap_or(default)
    }
}
