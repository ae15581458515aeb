use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::constants::*;
use crate::errors::{Error, Result};

/// Time-to-live per cached entity type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheSettings {
    pub exchanges_ttl: Duration,
    pub symbols_ttl: Duration,
    pub quotes_ttl: Duration,
    pub history_ttl: Duration,
    pub fundamentals_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            exchanges_ttl: Duration::hours(DEFAULT_EXCHANGES_TTL_HOURS),
            symbols_ttl: Duration::hours(DEFAULT_SYMBOLS_TTL_HOURS),
            quotes_ttl: Duration::hours(DEFAULT_QUOTES_TTL_HOURS),
            history_ttl: Duration::hours(DEFAULT_HISTORY_TTL_HOURS),
            fundamentals_ttl: Duration::hours(DEFAULT_FUNDAMENTALS_TTL_HOURS),
        }
    }
}

impl CacheSettings {
    /// Build from TTLs expressed in hours, rejecting non-positive values.
    pub fn from_hours(
        exchanges: i64,
        symbols: i64,
        quotes: i64,
        history: i64,
        fundamentals: i64,
    ) -> Result<Self> {
        let ttl = |name: &str, hours: i64| {
            if hours <= 0 {
                return Err(Error::Config(format!(
                    "{} TTL must be positive, got {} hours",
                    name, hours
                )));
            }
            Ok(Duration::hours(hours))
        };

        Ok(Self {
            exchanges_ttl: ttl("exchanges", exchanges)?,
            symbols_ttl: ttl("symbols", symbols)?,
            quotes_ttl: ttl("quotes", quotes)?,
            history_ttl: ttl("history", history)?,
            fundamentals_ttl: ttl("fundamentals", fundamentals)?,
        })
    }
}

/// Bulk backfill tuning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillSettings {
    /// Batch size used when the caller does not pass one.
    pub batch_size: usize,
    /// Worker count per batch.
    pub concurrency: usize,
    /// Worker `i` starts after `i * worker_stagger`.
    pub worker_stagger: StdDuration,
    pub cooldown_per_hit: StdDuration,
    pub max_cooldown: StdDuration,
    pub inter_batch_delay: StdDuration,
    /// Ledger records whose last attempt is older than this are purged at run start.
    /// `None` keeps them until a successful fetch clears them.
    pub ledger_max_age: Option<Duration>,
}

impl Default for BackfillSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_BACKFILL_CONCURRENCY,
            worker_stagger: DEFAULT_WORKER_STAGGER,
            cooldown_per_hit: DEFAULT_COOLDOWN_PER_HIT,
            max_cooldown: DEFAULT_MAX_COOLDOWN,
            inter_batch_delay: DEFAULT_INTER_BATCH_DELAY,
            ledger_max_age: None,
        }
    }
}

impl BackfillSettings {
    /// Cool-down after a batch that saw `rate_limit_hits` throttled calls.
    pub fn cooldown_for(&self, rate_limit_hits: usize) -> StdDuration {
        let hits = u32::try_from(rate_limit_hits).unwrap_or(u32::MAX);
        self.cooldown_per_hit
            .saturating_mul(hits)
            .min(self.max_cooldown)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config("batch size must be at least 1".to_string()));
        }
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        Ok(())
    }
}
