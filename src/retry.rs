//! Bounded exponential backoff.
//!
//! Attempt `0` runs immediately; attempt `n > 0` waits
//! `initial_delay × 2^(n-1)` first. With `initial_delay = 2s` and five
//! attempts the waits are 2s, 4s, 8s, 16s.

use std::time::Duration;

/// Cap on the doubling exponent so very large attempt counts cannot overflow.
const MAX_EXPONENT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    /// Delay to wait before the zero-based `attempt`, or `None` for the first.
    pub fn delay_before(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 {
            return None;
        }
        let exponent = (attempt - 1).min(MAX_EXPONENT);
        Some(self.initial_delay.saturating_mul(1u32 << exponent))
    }

    /// Total time spent sleeping if every attempt fails.
    pub fn worst_case_wait(&self) -> Duration {
        (0..self.max_attempts)
            .filter_map(|a| self.delay_before(a))
            .fold(Duration::ZERO, |acc, d| acc.saturating_add(d))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2))
    }
}
