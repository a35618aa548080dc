//! Per-host rate limiting shared by every source collaborator.
//!
//! Calls to different hosts proceed independently; calls to the same host
//! are spaced by at least the configured interval, stretched further when a
//! host answers 429 with a Retry-After header.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Maximum Retry-After value honored.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Default spacing between calls to one host.
pub const DEFAULT_HOST_INTERVAL: Duration = Duration::from_millis(200);

/// Shared per-host limiter; wrap in `Arc` and hand to every source.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    hosts: DashMap<String, Arc<HostState>>,
}

#[derive(Debug)]
struct HostState {
    /// Earliest instant the next call may start; `None` before the first call.
    next_allowed: Mutex<Option<Instant>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_INTERVAL)
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            hosts: DashMap::new(),
        }
    }

    /// A limiter that never waits.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    fn state(&self, host: &str) -> Arc<HostState> {
        // Clone the Arc so the shard lock is released before awaiting.
        self.hosts
            .entry(host.to_string())
            .or_insert_with(|| {
                Arc::new(HostState {
                    next_allowed: Mutex::new(None),
                })
            })
            .clone()
    }

    /// Waits until a call to `url`'s host is allowed, then reserves the slot.
    pub async fn acquire(&self, url: &str) {
        let host = extract_host(url);
        let state = self.state(&host);
        let mut next_allowed = state.next_allowed.lock().await;
        if let Some(at) = *next_allowed {
            let now = Instant::now();
            if at > now {
                let wait = at - now;
                debug!(host = %host, wait_ms = wait.as_millis(), "rate limiting host");
                tokio::time::sleep(wait).await;
            }
        }
        *next_allowed = Some(Instant::now() + self.interval);
    }

    /// Pushes the host's next slot out by a server-mandated delay.
    pub async fn record_rate_limit(&self, url: &str, delay: Duration) {
        let host = extract_host(url);
        let state = self.state(&host);
        let mut next_allowed = state.next_allowed.lock().await;
        let until = Instant::now() + delay;
        if next_allowed.is_none_or(|at| at < until) {
            *next_allowed = Some(until);
        }
        warn!(host = %host, delay_secs = delay.as_secs(), "host asked us to slow down");
    }
}

/// Lowercase host of `url`, or `"unknown"` when it cannot be parsed.
///
/// ```
/// use citeforge_core::source::rate_limiter::extract_host;
///
/// assert_eq!(extract_host("https://API.Crossref.org/works"), "api.crossref.org");
/// assert_eq!(extract_host("not a url"), "unknown");
/// ```
#[must_use]
pub fn extract_host(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Parses a Retry-After header: integer seconds or an HTTP-date.
/// Values above one hour are capped; dates in the past yield zero.
///
/// ```
/// use std::time::Duration;
/// use citeforge_core::source::rate_limiter::parse_retry_after;
///
/// assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
/// assert_eq!(parse_retry_after("soon"), None);
/// ```
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();
    if let Ok(seconds) = header_value.parse::<u64>() {
        return Some(Duration::from_secs(seconds).min(MAX_RETRY_AFTER));
    }
    let at = httpdate::parse_http_date(header_value).ok()?;
    Some(
        at.duration_since(std::time::SystemTime::now())
            .map_or(Duration::ZERO, |wait| wait.min(MAX_RETRY_AFTER)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_call_to_host_is_immediate() {
        tokio::time::pause();
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire("https://api.crossref.org/works").await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_same_host_is_spaced() {
        tokio::time::pause();
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire("https://api.crossref.org/a").await;
        limiter.acquire("https://api.crossref.org/b").await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_different_hosts_are_independent() {
        tokio::time::pause();
        let limiter = RateLimiter::new(Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire("https://api.crossref.org/a").await;
        limiter.acquire("https://api.openalex.org/a").await;
        assert!(start.elapsed() < Duration::from_millis(10));
    }

    #[tokio::test]
    async fn test_recorded_rate_limit_delays_next_call() {
        tokio::time::pause();
        let limiter = RateLimiter::disabled();
        limiter
            .record_rate_limit("https://api.openalex.org/x", Duration::from_secs(5))
            .await;
        let start = Instant::now();
        limiter.acquire("https://api.openalex.org/y").await;
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[test]
    fn test_parse_retry_after_caps_and_rejects() {
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("999999"), Some(MAX_RETRY_AFTER));
        assert_eq!(parse_retry_after("-5"), None);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }
}
