use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Grants at most one acquisition per `1 / max_per_second`, across every task sharing it.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    // The lock is held across the wait so concurrent callers cannot both read a stale grant.
    last_grant: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_second: f64) -> Self {
        let interval = (max_per_second.is_finite() && max_per_second > 0.0)
            .then(|| Duration::try_from_secs_f64(1.0 / max_per_second).ok())
            .flatten();
        Self::with_interval(interval.unwrap_or(Duration::from_secs(1)))
    }

    pub fn with_interval(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_grant: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    pub async fn acquire(&self) {
        let mut last = self.last_grant.lock().await;
        if let Some(prev) = *last {
            let ready_at = prev + self.min_interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }
}
