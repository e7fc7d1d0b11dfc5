//! Bounded retry with exponential backoff and jitter.
//!
//! [`Retry::run`] re-invokes an operation while its error is transient,
//! sleeping for the hint the error carries (or the configured [`Backoff`]).
//! [`with_deadline`] bounds a whole invocation, retries included.

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::{ErrorEnvelope, NoobitResult};

/// Backoff strategy used when an error carries no sleep hint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed {
        /// Delay between retries.
        delay: Duration,
    },
    /// Uses an exponential delay between retries.
    ///
    /// The delay is calculated as `base * (factor ^ attempt)`.
    Exponential {
        /// The initial backoff duration.
        base: Duration,
        /// The multiplicative factor for each subsequent retry.
        factor: f64,
        /// The maximum duration to wait between retries.
        max: Duration,
        /// Whether to apply random jitter (+/- 50%) to the delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(200),
            factor: 2.0,
            max: Duration::from_secs(3),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay before retry number `attempt` (0-based).
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(attempt.min(i32::MAX as u32) as i32);
                let seconds = (base.as_secs_f64() * scale).min(max.as_secs_f64());
                let mut delay = Duration::from_secs_f64(seconds.max(0.0));

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let random_offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms =
                        delay.as_millis() as i64 + (random_offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Retry policy shared by every adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Enables or disables the retry mechanism.
    pub enabled: bool,
    /// Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Statuses treated as transient when the body carries no exchange error.
    pub retry_on_status: Vec<u16>,
    /// Whether connection failures are transient.
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 4,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }

    /// Total invocations allowed, first call included.
    pub fn budget(&self) -> NonZeroU32 {
        let retries = if self.enabled { self.max_retries } else { 0 };
        NonZeroU32::MIN.saturating_add(retries)
    }
}

/// What the retry sink is told before each sleep.
#[derive(Debug)]
pub struct RetryEvent<'a> {
    /// Invocations so far, the failed one included.
    pub attempt: u32,
    pub budget: u32,
    pub sleep: Duration,
    pub error: &'a ErrorEnvelope,
}

pub type RetrySink = Arc<dyn Fn(&RetryEvent<'_>) + Send + Sync>;

/// Retry combinator over a closure producing the operation future.
#[derive(Clone)]
pub struct Retry {
    budget: NonZeroU32,
    backoff: Backoff,
    sink: Option<RetrySink>,
}

impl Debug for Retry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retry")
            .field("budget", &self.budget)
            .field("backoff", &self.backoff)
            .field("sink", &self.sink.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl Retry {
    pub fn new(budget: NonZeroU32) -> Self {
        Self {
            budget,
            backoff: Backoff::default(),
            sink: None,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.budget()).with_backoff(config.backoff)
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replace the default `tracing` sink.
    pub fn with_sink(mut self, sink: impl Fn(&RetryEvent<'_>) + Send + Sync + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    pub const fn budget(&self) -> NonZeroU32 {
        self.budget
    }

    /// Invoke `operation` until it succeeds, fails terminally, or the budget
    /// is spent. Returns the last error on exhaustion.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> NoobitResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = NoobitResult<T>>,
    {
        let budget = self.budget.get();
        let mut attempt = 0_u32;

        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let Some(hint) = error.retry_hint() else {
                return Err(error);
            };
            if attempt >= budget {
                tracing::warn!(attempt, budget, error = %error, "retry budget exhausted");
                return Err(error);
            }

            let sleep = hint.unwrap_or_else(|| self.backoff.delay(attempt - 1));
            let event = RetryEvent {
                attempt,
                budget,
                sleep,
                error: &error,
            };
            match &self.sink {
                Some(sink) => sink(&event),
                None => tracing::warn!(
                    attempt,
                    budget,
                    sleep_ms = sleep.as_millis() as u64,
                    error = %error,
                    "retrying after transient failure"
                ),
            }

            tokio::time::sleep(sleep).await;
        }
    }
}

/// Bound `future` by `deadline`. Expiry drops the in-flight call.
pub async fn with_deadline<T>(
    deadline: Duration,
    future: impl Future<Output = NoobitResult<T>>,
) -> NoobitResult<T> {
    tokio::time::timeout(deadline, future)
        .await
        .unwrap_or_else(|_| Err(ErrorEnvelope::timeout(deadline)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff_with_jitter() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);

                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();

        assert!(config.enabled);
        assert_eq!(config.budget().get(), 5);
        assert!(config.should_retry_status(429));
        assert!(config.should_retry_status(503));
        assert!(!config.should_retry_status(400));
        assert!(config.retry_on_connect);
    }

    #[test]
    fn test_retry_config_no_retry_allows_single_attempt() {
        let config = RetryConfig {
            max_retries: 7,
            ..RetryConfig::no_retry()
        };

        assert_eq!(config.budget().get(), 1);
    }

    #[tokio::test]
    async fn deadline_expiry_is_a_timeout_error() {
        let result: NoobitResult<()> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let err = result.expect_err("must time out");
        assert_eq!(err.kind(), crate::ErrorKind::Timeout);
        assert!(!err.retryable());
    }
}
