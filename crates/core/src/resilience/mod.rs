pub mod executor;
pub mod rate_limit;

pub use executor::{CallExecutor, RetryPolicy};
pub use rate_limit::RateLimiter;

use std::fmt;
use std::time::Duration;

/// Raised by clients when the remote service answers HTTP 429.
#[derive(Debug, Clone)]
pub struct RateLimitedError {
    pub service: &'static str,
    pub retry_after: Option<Duration>,
}

impl fmt::Display for RateLimitedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.retry_after {
            Some(wait) => write!(
                f,
                "{} rate limit exceeded (retry after {}s)",
                self.service,
                wait.as_secs()
            ),
            None => write!(f, "{} rate limit exceeded", self.service),
        }
    }
}

impl std::error::Error for RateLimitedError {}

/// Parses a `Retry-After` header given in delta-seconds. HTTP-date values are ignored.
pub fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> Option<Duration> {
    let secs = value?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn retry_after_accepts_delta_seconds_only() {
        let v = HeaderValue::from_static("30");
        assert_eq!(parse_retry_after(Some(&v)), Some(Duration::from_secs(30)));

        let date = HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&date)), None);
        assert_eq!(parse_retry_after(None), None);
    }
}
