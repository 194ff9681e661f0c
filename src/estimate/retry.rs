//! Backoff policy for the estimation service.

use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

use crate::common::constants::*;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u32,
    pub max_delay_ms: u64,
    /// Uniform jitter applied in `[-jitter_ms, +jitter_ms]`.
    pub jitter_ms: u64,
}

pub trait BackoffPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration;
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: ESTIMATE_MAX_ATTEMPTS,
            base_delay_ms: ESTIMATE_BASE_DELAY_MS,
            factor: ESTIMATE_BACKOFF_FACTOR,
            max_delay_ms: ESTIMATE_MAX_DELAY_MS,
            jitter_ms: ESTIMATE_JITTER_MS,
        }
    }
}

impl RetryPolicy {
    /// Exponential delay before jitter: `base * factor^(attempt-1)`, capped.
    pub fn nominal_delay_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(32);
        let multiplier = u64::from(self.factor).saturating_pow(exponent);
        self.base_delay_ms
            .saturating_mul(multiplier)
            .min(self.max_delay_ms)
    }

    /// Delay for `attempt` with an explicit jitter offset, kept within `[0, cap]`.
    pub fn delay_with_offset(&self, attempt: u32, offset_ms: i64) -> Duration {
        let jitter = offset_ms.clamp(-(self.jitter_ms as i64), self.jitter_ms as i64);
        let delay = (self.nominal_delay_ms(attempt) as i64 + jitter).clamp(0, self.max_delay_ms as i64);
        Duration::from_millis(delay as u64)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl BackoffPolicy for RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let bound = self.jitter_ms as i64;
        let offset = if bound == 0 {
            0
        } else {
            rand::rng().random_range(-bound..=bound)
        };
        self.delay_with_offset(attempt, offset)
    }
}

/// Parse a `Retry-After` header: delta seconds or an HTTP-date.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let when = DateTime::parse_from_rfc2822(value).ok()?;
    let wait = when.with_timezone(&Utc) - now;
    Some(wait.to_std().unwrap_or(Duration::ZERO))
}
