//! Retry with exponential backoff for transient collaborator failures.
//!
//! Each attempt runs under its own timeout. A timed-out attempt counts as a
//! transient failure; once attempts are exhausted the last error is returned
//! and the caller treats the source as having produced nothing.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::SourceError;
use crate::record::Source;

/// Default base delay before the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default cap for a single backoff delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(8);

const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Longest server-mandated wait honored between attempts.
const MAX_SERVER_WAIT: Duration = Duration::from_secs(30);

/// Upper bound for jitter; never more than the base delay itself.
const MAX_JITTER: Duration = Duration::from_millis(250);

/// Classification of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Timeouts, network errors, 408 and 5xx.
    Transient,
    /// Bad requests, auth failures, unparseable bodies, missing keys.
    Permanent,
    /// HTTP 429.
    RateLimited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration, attempt: u32 },
    DoNotRetry { reason: String },
}

/// Backoff policy: `min(base * multiplier^(attempt-1), max) + jitter`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts including the first one.
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_retries(crate::config::DEFAULT_SOURCE_RETRIES)
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Policy allowing `retries` retries after the first attempt.
    #[must_use]
    pub fn with_retries(retries: u32) -> Self {
        Self::new(
            retries.saturating_add(1),
            DEFAULT_BASE_DELAY,
            DEFAULT_MAX_DELAY,
            DEFAULT_BACKOFF_MULTIPLIER,
        )
    }

    /// Retries without any delay; used by tests and mock collaborators.
    #[must_use]
    pub fn immediate(retries: u32) -> Self {
        Self::new(retries.saturating_add(1), Duration::ZERO, Duration::ZERO, 1.0)
    }

    /// Same backoff shape with a different retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_attempts = retries.saturating_add(1);
        self
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether attempt number `attempt` (1-indexed) should be followed by another.
    #[must_use]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }
        RetryDecision::Retry {
            delay: self.calculate_delay(attempt),
            attempt: attempt + 1,
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn calculate_jitter(&self) -> Duration {
        let ceiling = MAX_JITTER.min(self.base_delay).as_millis() as u64;
        if ceiling == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=ceiling))
    }

    /// Runs `operation` until it succeeds, fails permanently, or attempts run out.
    /// Every attempt is bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns the last [`SourceError`] once no further retry is allowed.
    pub async fn run<T, F, Fut>(
        &self,
        origin: Source,
        timeout: Duration,
        mut operation: F,
    ) -> Result<T, SourceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(timeout, operation()).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout {
                    origin,
                    after: timeout,
                }),
            };
            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            match self.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    debug!(
                        source = %origin,
                        attempt,
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "retrying source call"
                    );
                    tokio::time::sleep(retry_after_or(&error, delay)).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(source = %origin, attempt, %reason, "giving up on source call");
                    return Err(error);
                }
            }
        }
    }
}

/// Server-mandated delay when longer than the computed backoff, capped.
fn retry_after_or(error: &SourceError, delay: Duration) -> Duration {
    match error {
        SourceError::HttpStatus {
            retry_after: Some(value),
            ..
        } => super::rate_limiter::parse_retry_after(value)
            .map_or(delay, |server| server.min(MAX_SERVER_WAIT).max(delay)),
        _ => delay,
    }
}

/// Classifies a collaborator error for retry decisions.
#[must_use]
pub fn classify_error(error: &SourceError) -> FailureType {
    match error {
        SourceError::HttpStatus { status, .. } => classify_http_status(*status),
        SourceError::Timeout { .. } => FailureType::Transient,
        SourceError::Network { error, .. } => {
            if is_tls_error(error) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        SourceError::Parse { .. }
        | SourceError::MissingKey { .. }
        | SourceError::ClientBuild(_)
        | SourceError::Discovery { .. } => FailureType::Permanent,
    }
}

fn classify_http_status(status: u16) -> FailureType {
    match status {
        408 | 500..=599 => FailureType::Transient,
        429 => FailureType::RateLimited,
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("certificate") || message.contains("tls") || message.contains("ssl")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_with_retries_counts_first_attempt() {
        assert_eq!(RetryPolicy::with_retries(2).max_attempts(), 3);
        assert_eq!(RetryPolicy::immediate(0).max_attempts(), 1);
    }

    #[test]
    fn test_permanent_failure_not_retried() {
        let policy = RetryPolicy::with_retries(3);
        assert!(matches!(
            policy.should_retry(FailureType::Permanent, 1),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_delay_grows_and_is_capped() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_secs(5), 2.0);
        let first = policy.calculate_delay(1);
        assert!(first >= Duration::from_secs(1) && first <= Duration::from_millis(1250));
        let capped = policy.calculate_delay(8);
        assert!(capped >= Duration::from_secs(5) && capped <= Duration::from_millis(5250));
    }

    #[test]
    fn test_classify_statuses() {
        let status = |code| SourceError::http_status(Source::Crossref, "http://x", code);
        assert_eq!(classify_error(&status(503)), FailureType::Transient);
        assert_eq!(classify_error(&status(429)), FailureType::RateLimited);
        assert_eq!(classify_error(&status(400)), FailureType::Permanent);
        assert_eq!(
            classify_error(&SourceError::Timeout {
                origin: Source::Crossref,
                after: Duration::from_secs(1)
            }),
            FailureType::Transient
        );
    }

    #[tokio::test]
    async fn test_run_retries_transient_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = RetryPolicy::immediate(2)
            .run(Source::Crossref, Duration::from_secs(1), || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(SourceError::http_status(Source::Crossref, "http://x", 503))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_run_stops_on_permanent_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = RetryPolicy::immediate(5)
            .run(Source::Openalex, Duration::from_secs(1), || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SourceError::parse(Source::Openalex, "http://x", "bad json"))
                }
            })
            .await;
        assert!(matches!(result, Err(SourceError::Parse { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_times_out_each_attempt() {
        tokio::time::pause();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), _> = RetryPolicy::immediate(1)
            .run(Source::Arxiv, Duration::from_millis(50), || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(())
                }
            })
            .await;
        assert!(matches!(result, Err(SourceError::Timeout { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
