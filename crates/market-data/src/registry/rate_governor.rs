//! Process-wide request permit pool for the market data provider.
//!
//! Every outbound provider call, interactive or background, takes one permit from a
//! single shared bucket. The bucket holds `permits_per_window` permits and is refilled
//! to capacity once the current window has elapsed.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderError;

/// Default permits per window (provider allowance of 1000 calls per minute).
const DEFAULT_PERMITS_PER_WINDOW: u32 = 1000;

/// Default replenishment window.
const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Permit bucket for the current window.
#[derive(Debug)]
struct PermitWindow {
    /// Permits left in the current window.
    available: u32,
    /// Start of the current window.
    window_start: Instant,
    /// Permits granted per window.
    capacity: u32,
    /// Window length.
    window: Duration,
}

impl PermitWindow {
    fn new(capacity: u32, window: Duration) -> Self {
        Self {
            available: capacity,
            window_start: Instant::now(),
            capacity,
            window,
        }
    }

    /// Start a new window if the current one has elapsed.
    fn replenish(&mut self) {
        let now = Instant::now();
        if now.duration_since(self.window_start) >= self.window {
            self.window_start = now;
            self.available = self.capacity;
        }
    }

    fn try_acquire(&mut self) -> bool {
        self.replenish();

        if self.available > 0 {
            self.available -= 1;
            true
        } else {
            false
        }
    }

    /// Time until the next window opens, or zero if a permit is available now.
    fn time_until_available(&mut self) -> Duration {
        self.replenish();

        if self.available > 0 {
            Duration::ZERO
        } else {
            (self.window_start + self.window).saturating_duration_since(Instant::now())
        }
    }
}

/// Rate governor configuration.
#[derive(Clone, Debug)]
pub struct RateGovernorConfig {
    /// Permits granted per window.
    pub permits_per_window: u32,
    /// Replenishment window.
    pub window: Duration,
}

impl Default for RateGovernorConfig {
    fn default() -> Self {
        Self {
            permits_per_window: DEFAULT_PERMITS_PER_WINDOW,
            window: DEFAULT_WINDOW,
        }
    }
}

/// Shared request permit limiter.
///
/// Construct once and hand the same `Arc<RateGovernor>` to every component that calls
/// the provider. Interactive refreshes and bulk backfills draw from the same bucket.
pub struct RateGovernor {
    bucket: Mutex<PermitWindow>,
    config: RateGovernorConfig,
}

impl RateGovernor {
    /// Create a governor. A zero capacity or window is raised to the smallest usable value.
    pub fn new(config: RateGovernorConfig) -> Self {
        let config = RateGovernorConfig {
            permits_per_window: config.permits_per_window.max(1),
            window: config.window.max(Duration::from_millis(1)),
        };
        Self {
            bucket: Mutex::new(PermitWindow::new(config.permits_per_window, config.window)),
            config,
        }
    }

    /// Lock the bucket mutex, recovering from poison if necessary.
    fn lock_bucket(&self) -> MutexGuard<'_, PermitWindow> {
        self.bucket.lock().unwrap_or_else(|poisoned| {
            warn!("Rate governor mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait for a permit.
    ///
    /// Never fails because the bucket is empty; the only error is
    /// [`ProviderError::Cancelled`] when `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ProviderError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let wait_time = {
                let mut bucket = self.lock_bucket();
                if bucket.try_acquire() {
                    return Ok(());
                }
                bucket.time_until_available()
            };

            debug!("Rate governor: window exhausted, waiting {:?}", wait_time);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(wait_time) => {}
            }
        }
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.lock_bucket().try_acquire()
    }

    /// Permits left in the current window.
    pub fn available_permits(&self) -> u32 {
        let mut bucket = self.lock_bucket();
        bucket.replenish();
        bucket.available
    }

    pub fn config(&self) -> &RateGovernorConfig {
        &self.config
    }
}

impl Default for RateGovernor {
    fn default() -> Self {
        Self::new(RateGovernorConfig::default())
    }
}
