// src/backoff.rs
// Exponential backoff between retries of transient page fetches and store writes.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    base_ms: u64,
    max_ms: u64,
}

impl ExponentialBackoff {
    pub const fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    // Delay before retry number `attempt` (0-based), capped at max_ms
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponential = self
            .base_ms
            .saturating_mul(2u64.saturating_pow(attempt.min(20)));
        Duration::from_millis(exponential.min(self.max_ms))
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(250, 5_000)
    }
}
