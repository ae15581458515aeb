//! Bounded exponential backoff for transient provider failures.

use std::time::Duration;

use rand::Rng;

/// Retry policy for transient provider failures.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Retries after the first attempt (default: 3).
    pub max_retries: u32,
    /// Delay before the first retry (default: 500ms).
    pub initial_backoff: Duration,
    /// Upper bound for any single delay (default: 10s).
    pub max_backoff: Duration,
    /// Growth factor between retries (default: 2.0).
    pub multiplier: f64,
    /// Randomisation applied to each delay (default: 0.2 = ±20%).
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based), jitter included, capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base_ms = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_backoff.as_millis() as f64);

        let jittered_ms = if self.jitter_factor > 0.0 {
            let jitter = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
            capped_ms * (1.0 + jitter)
        } else {
            capped_ms
        };

        Duration::from_millis(jittered_ms.max(0.0) as u64).min(self.max_backoff)
    }
}
