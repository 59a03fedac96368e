//! Exponential backoff with full jitter.
use std::time::Duration;

use rand::Rng;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryConfig {
    pub const fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts,
            base_delay_ms,
            max_delay_ms,
        }
    }

    /// Delay before the attempt following failed attempt number `attempt`
    /// (1-based): uniform in `[0, min(base * 2^(attempt-1), max)]`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let exponential = self
            .base_delay_ms
            .saturating_mul(1_u64.checked_shl(attempt - 1).unwrap_or(u64::MAX));
        let capped = exponential.min(self.max_delay_ms);
        if capped == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=capped))
    }

    /// Whether another attempt is allowed after `attempt` attempts.
    pub const fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}
