//! Retry with exponential backoff.
//!
//! Failed attempt `n` (counting from 1) is followed by a sleep of
//! `base_delay * 2^n`. After `max_attempts` failures the last error is
//! returned unchanged.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use college_types::RetryConfig;

/// Which failures are worth another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorClassification {
    /// Retry every error.
    #[default]
    Blind,
    /// Retry only errors that look transient (rate limits, timeouts,
    /// connection and transport failures).
    TransientOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub classify: ErrorClassification,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryConfig::default().into()
    }
}

impl From<RetryConfig> for RetryPolicy {
    fn from(config: RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            classify: ErrorClassification::Blind,
        }
    }
}

impl RetryPolicy {
    /// Policy from `COLLEGE_RETRY_ATTEMPTS` / `COLLEGE_RETRY_BASE_MS`.
    pub fn from_env() -> Self {
        RetryConfig::from_env().into()
    }

    pub fn transient_only(mut self) -> Self {
        self.classify = ErrorClassification::TransientOnly;
        self
    }

    /// Sleep after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exp = u32::try_from(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(2u32.saturating_pow(exp))
    }

    fn should_retry(&self, error: &impl Display) -> bool {
        match self.classify {
            ErrorClassification::Blind => true,
            ErrorClassification::TransientOnly => is_transient_error(&error.to_string()),
        }
    }
}

/// Heuristic for errors that may succeed on a later attempt.
pub fn is_transient_error(message: &str) -> bool {
    let s = message.to_ascii_lowercase();
    s.contains("429")
        || s.contains("too many")
        || s.contains("timed out")
        || s.contains("timeout")
        || s.contains("connection")
        || s.contains("transport")
        || s.contains("network")
}

/// Run `op` until it succeeds or `policy.max_attempts` attempts have failed.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut failures = 0usize;

    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                failures += 1;
                if failures >= max_attempts || !policy.should_retry(&e) {
                    return Err(e);
                }
                let delay = policy.delay_for(failures);
                tracing::warn!(
                    what,
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "read failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<(), String> = with_retry(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("boom".to_string()) }
        })
        .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 2s after the first failure, 4s after the second, none after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_second_attempt() {
        let calls = AtomicUsize::new(0);
        let start = tokio::time::Instant::now();

        let result: Result<u32, String> = with_retry(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err("flaky".to_string())
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_try_does_not_sleep() {
        let start = tokio::time::Instant::now();
        let result: Result<u8, String> =
            with_retry(&RetryPolicy::default(), "test", || async { Ok(1) }).await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_only_stops_on_permanent_error() {
        let calls = AtomicUsize::new(0);
        let policy = RetryPolicy::default().transient_only();

        let result: Result<(), String> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("execution reverted: InvalidCourseId".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        calls.store(0, Ordering::SeqCst);
        let result: Result<(), String> = with_retry(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("transport error: connection reset".to_string()) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert!(is_transient_error("HTTP 429 Too Many Requests"));
        assert!(!is_transient_error("user rejected transaction"));
    }
}
