//! Bounded retries for tracker fetches.
//!
//! Fetches are the only fallible, asynchronous boundary. A transient
//! failure is retried a few times with capped exponential backoff, then
//! handed back so the caller can degrade instead of blocking.

use std::future::Future;
use std::time::{Duration, Instant};

/// Backoff schedule for one fetch.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt (0 = fail fast).
    pub max_retries: u32,

    /// Delay before the first retry.
    pub initial_delay: Duration,

    /// Upper bound on any single delay.
    pub max_delay: Duration,

    /// Growth factor between consecutive delays.
    pub multiplier: f64,

    /// Shave up to a quarter off each delay so clients spread out.
    pub jitter: bool,

    /// Give up on a single attempt after this long.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::fetch()
    }
}

impl RetryConfig {
    /// One attempt, no retries.
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Self::fetch() }
    }

    /// Schedule used for tracker fetches: two retries, 200ms doubling to 2s.
    pub fn fetch() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
            attempt_timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Attempts made before giving up, the first one included.
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the `retry`-th retry (1-based). Never exceeds `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let exponent = retry.saturating_sub(1).min(32) as i32;
        let growth = self.multiplier.max(1.0).powi(exponent);
        // f64::min drops a NaN from 0 * inf in favour of the cap
        let mut secs = (self.initial_delay.as_secs_f64() * growth).min(self.max_delay.as_secs_f64());

        if self.jitter {
            secs *= 1.0 - jitter_fraction() * 0.25;
        }

        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// 0.0..1.0 from the clock's sub-second noise.
fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// An attempt exceeded `RetryConfig::attempt_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptTimedOut(pub Duration);

/// How a retried fetch ended.
#[derive(Debug)]
pub struct RetryResult<T, E> {
    /// Last attempt's result
    pub result: Result<T, E>,

    /// Attempts made, the first one included
    pub attempts: u32,

    /// Wall time including backoff
    pub elapsed: Duration,
}

impl<T, E> RetryResult<T, E> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    /// More than one attempt was needed.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    pub fn into_result(self) -> Result<T, E> {
        self.result
    }
}

/// Run `operation` until it succeeds, fails with an error `is_transient`
/// rejects, or the schedule runs out.
pub async fn retry_async<T, E, F, Fut, P>(
    config: &RetryConfig,
    mut operation: F,
    is_transient: P,
) -> RetryResult<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: From<AttemptTimedOut>,
{
    let started = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;
        let result = match config.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, operation())
                .await
                .unwrap_or_else(|_| Err(E::from(AttemptTimedOut(limit)))),
            None => operation().await,
        };

        let give_up = match &result {
            Ok(_) => true,
            Err(e) => !is_transient(e) || attempts >= config.total_attempts(),
        };
        if give_up {
            return RetryResult { result, attempts, elapsed: started.elapsed() };
        }

        let delay = config.backoff(attempts);
        tracing::debug!(attempt = attempts, delay_ms = delay.as_millis() as u64, "Retrying fetch");
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[derive(Debug, PartialEq)]
    enum FetchError {
        Gateway,
        Forbidden,
        TimedOut,
    }

    impl From<AttemptTimedOut> for FetchError {
        fn from(_: AttemptTimedOut) -> Self {
            Self::TimedOut
        }
    }

    fn quick() -> RetryConfig {
        RetryConfig {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: false,
            ..RetryConfig::fetch()
        }
    }

    #[test]
    fn test_fetch_schedule() {
        let config = RetryConfig::fetch();
        assert_eq!(config.total_attempts(), 3);
        assert_eq!(RetryConfig::no_retry().total_attempts(), 1);
    }

    #[test]
    fn test_backoff_doubles_until_capped() {
        let config = RetryConfig { jitter: false, ..RetryConfig::fetch() };

        assert_eq!(config.backoff(0), Duration::ZERO);
        assert_eq!(config.backoff(1), Duration::from_millis(200));
        assert_eq!(config.backoff(2), Duration::from_millis(400));
        assert_eq!(config.backoff(3), Duration::from_millis(800));
        assert_eq!(config.backoff(5), Duration::from_secs(2));
        assert_eq!(config.backoff(u32::MAX), Duration::from_secs(2));
    }

    #[test]
    fn test_jitter_stays_within_cap() {
        let config = RetryConfig { multiplier: 10.0, ..RetryConfig::fetch() };
        for retry in 1..8 {
            let delay = config.backoff(retry);
            assert!(delay <= config.max_delay);
            assert!(delay >= config.initial_delay.mul_f64(0.75));
        }
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let outcome = retry_async(
            &quick(),
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::Gateway)
                } else {
                    Ok("boards")
                }
            },
            |e| *e == FetchError::Gateway,
        )
        .await;

        assert!(outcome.is_ok());
        assert_eq!(outcome.attempts, 3);
        assert!(outcome.was_retried());
    }

    #[tokio::test]
    async fn test_permanent_error_fails_fast() {
        let outcome = retry_async(
            &quick(),
            || async { Err::<(), _>(FetchError::Forbidden) },
            |e| *e == FetchError::Gateway,
        )
        .await;

        assert_eq!(outcome.attempts, 1);
        assert!(!outcome.was_retried());
        assert_eq!(outcome.into_result(), Err(FetchError::Forbidden));
    }

    #[tokio::test]
    async fn test_schedule_runs_out() {
        let outcome = retry_async(
            &RetryConfig { max_retries: 2, ..quick() },
            || async { Err::<(), _>(FetchError::Gateway) },
            |_| true,
        )
        .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.into_result(), Err(FetchError::Gateway));
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out() {
        let config = RetryConfig {
            max_retries: 0,
            attempt_timeout: Some(Duration::from_millis(5)),
            ..quick()
        };
        let outcome = retry_async(
            &config,
            || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, FetchError>(())
            },
            |_| true,
        )
        .await;

        assert_eq!(outcome.into_result(), Err(FetchError::TimedOut));
    }
}
