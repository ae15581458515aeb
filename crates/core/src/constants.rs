use std::time::Duration;

/// Symbols per backfill batch
pub const DEFAULT_BATCH_SIZE: usize = 3000;

/// Simultaneous provider calls within a backfill batch
pub const DEFAULT_BACKFILL_CONCURRENCY: usize = 5;

/// Start offset between consecutive backfill workers
pub const DEFAULT_WORKER_STAGGER: Duration = Duration::from_millis(50);

/// Cool-down added per rate-limit hit observed in a batch
pub const DEFAULT_COOLDOWN_PER_HIT: Duration = Duration::from_secs(10);

/// Upper bound of the post-batch cool-down
pub const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(5 * 60);

/// Pause between batches when no throttling was observed
pub const DEFAULT_INTER_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Default page size for list reads
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page a caller may request
pub const MAX_PAGE_SIZE: usize = 5000;

pub const DEFAULT_EXCHANGES_TTL_HOURS: i64 = 24 * 7;
pub const DEFAULT_SYMBOLS_TTL_HOURS: i64 = 24;
pub const DEFAULT_QUOTES_TTL_HOURS: i64 = 1;
pub const DEFAULT_HISTORY_TTL_HOURS: i64 = 12;
pub const DEFAULT_FUNDAMENTALS_TTL_HOURS: i64 = 24 * 7;
