//! Backoff for gateway transport failures.
//!
//! Only failures where no HTTP reply arrived (connection reset, timeout,
//! refused) are candidates. A reply the gateway did send, whether quota,
//! security rejection, or any other status, is classified once and never
//! retried. Retries are off by default.

use std::time::Duration;

/// Transport retry policy: doubling delays from `initial_delay`, capped at
/// `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first failure. `0` fails immediately.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_retries: retries,
            ..Default::default()
        }
    }

    /// Delay before retrying after failed attempt `attempt` (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` failed with `error`.
    pub fn should_retry(&self, attempt: u32, error: &str) -> bool {
        attempt < self.max_retries && is_transient_error(error)
    }
}

/// Whether a transport error looks worth repeating. Errors from
/// [`HttpGateway`](crate::HttpGateway) sends are prefixed `request failed:`;
/// body read failures are not retried.
pub fn is_transient_error(error: &str) -> bool {
    let lower = error.to_lowercase();
    lower.starts_with("request failed:")
        || ["connection reset", "connection refused", "timed out"]
            .iter()
            .any(|p| lower.contains(p))
}
