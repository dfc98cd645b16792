//! Retry policy for transient download failures.
//!
//! Pure decision logic: the fetch loop reports each attempt's outcome and
//! the policy answers whether to try again and how long to wait first.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::FetchOutcome;

/// Default escalating delay schedule in seconds.
pub const DEFAULT_DELAYS_SECS: [u64; 3] = [5, 15, 30];

/// Default number of attempts per fetch loop.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Upper bound applied to server-supplied `Retry-After` values.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Statuses worth retrying.
const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

/// Answer for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

impl RetryDecision {
    fn stop() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
        }
    }
}

/// Retry configuration for a single fetch loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after attempt `n` (0-based). The last entry repeats.
    #[serde(default = "default_delays", rename = "delays")]
    pub delays_secs: Vec<u64>,
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_delays() -> Vec<u64> {
    DEFAULT_DELAYS_SECS.to_vec()
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delays_secs: default_delays(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delays_secs: Vec<u64>) -> Self {
        Self {
            max_attempts,
            delays_secs,
        }
    }

    /// Check if a status code is transient.
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Check if an outcome is transient (timeout or retryable status).
    pub fn is_retryable(outcome: &FetchOutcome) -> bool {
        match outcome {
            FetchOutcome::Http { status, .. } => Self::is_retryable_status(*status),
            other => other.is_timeout(),
        }
    }

    /// Scheduled delay after the given 0-based attempt.
    pub fn scheduled_delay(&self, attempt: u32) -> Duration {
        let secs = self
            .delays_secs
            .get(attempt as usize)
            .or_else(|| self.delays_secs.last())
            .copied()
            .unwrap_or(0);
        Duration::from_secs(secs)
    }

    /// Decide whether to retry after `attempt` (0-based) produced `outcome`.
    pub fn should_retry(&self, attempt: u32, outcome: &FetchOutcome) -> RetryDecision {
        if !Self::is_retryable(outcome) || attempt + 1 >= self.max_attempts {
            return RetryDecision::stop();
        }

        let delay = match outcome.status() {
            Some(429) | Some(503) => outcome
                .header("retry-after")
                .and_then(|value| parse_retry_after(value, Utc::now()))
                .unwrap_or_else(|| self.scheduled_delay(attempt)),
            _ => self.scheduled_delay(attempt),
        };

        RetryDecision { retry: true, delay }
    }
}

/// Parse a `Retry-After` header (delta-seconds or HTTP date).
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    let delay = if let Ok(secs) = value.parse::<u64>() {
        Duration::from_secs(secs)
    } else {
        let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
        (at - now).to_std().unwrap_or(Duration::ZERO)
    };
    Some(delay.min(MAX_RETRY_AFTER))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::scrapers::types::FailureKind;

    fn http(status: u16, retry_after: Option<&str>) -> FetchOutcome {
        let mut headers = HashMap::new();
        if let Some(v) = retry_after {
            headers.insert("retry-after".to_string(), v.to_string());
        }
        FetchOutcome::Http {
            status,
            headers,
            body: Vec::new(),
        }
    }

    #[test]
    fn test_timeout_follows_schedule() {
        let policy = RetryPolicy::default();
        let timeout = FetchOutcome::error(FailureKind::Timeout, "read timed out");

        let first = policy.should_retry(0, &timeout);
        assert!(first.retry);
        assert_eq!(first.delay, Duration::from_secs(5));

        let second = policy.should_retry(1, &timeout);
        assert!(second.retry);
        assert_eq!(second.delay, Duration::from_secs(15));

        // Third attempt is the last one
        assert!(!policy.should_retry(2, &timeout).retry);
    }

    #[test]
    fn test_retryable_statuses() {
        let policy = RetryPolicy::default();
        for status in [429, 502, 503, 504] {
            assert!(policy.should_retry(0, &http(status, None)).retry, "{status}");
        }
        for status in [400, 401, 403, 404, 500] {
            assert!(!policy.should_retry(0, &http(status, None)).retry, "{status}");
        }
    }

    #[test]
    fn test_non_timeout_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let transport = FetchOutcome::error(FailureKind::Transport, "connection refused");
        let fs = FetchOutcome::error(FailureKind::Filesystem, "read-only");
        assert!(!policy.should_retry(0, &transport).retry);
        assert!(!policy.should_retry(0, &fs).retry);
    }

    #[test]
    fn test_retry_after_overrides_schedule_for_429_and_503() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(0, &http(429, Some("2")));
        assert_eq!(decision.delay, Duration::from_secs(2));

        let decision = policy.should_retry(1, &http(503, Some("7")));
        assert_eq!(decision.delay, Duration::from_secs(7));

        // 502 ignores Retry-After
        let decision = policy.should_retry(0, &http(502, Some("2")));
        assert_eq!(decision.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_unparseable_retry_after_falls_back() {
        let policy = RetryPolicy::default();
        let decision = policy.should_retry(0, &http(503, Some("soon")));
        assert_eq!(decision.delay, Duration::from_secs(5));
    }

    #[test]
    fn test_schedule_repeats_last_entry() {
        let policy = RetryPolicy::new(6, vec![1, 2]);
        assert_eq!(policy.scheduled_delay(0), Duration::from_secs(1));
        assert_eq!(policy.scheduled_delay(1), Duration::from_secs(2));
        assert_eq!(policy.scheduled_delay(4), Duration::from_secs(2));

        let empty = RetryPolicy::new(2, Vec::new());
        assert_eq!(empty.scheduled_delay(0), Duration::ZERO);
    }

    #[test]
    fn test_parse_retry_after_http_date() {
        let now = DateTime::parse_from_rfc2822("Wed, 21 Oct 2015 07:28:00 GMT")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        // Dates in the past mean "now"
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_parse_retry_after_is_capped() {
        assert_eq!(
            parse_retry_after("86400", Utc::now()),
            Some(MAX_RETRY_AFTER)
        );
    }

    #[test]
    fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(1, vec![5]);
        assert!(!policy.should_retry(0, &http(503, None)).retry);
    }
}
