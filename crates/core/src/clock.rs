//! Time source used for freshness decisions and run timestamps.

use chrono::{DateTime, Utc};

/// Source of "now".
///
/// Injected into the services so freshness boundaries can be tested with a fixed time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
