use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// How a bulk run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RunOutcome {
    Completed,
    /// The provider reported the daily quota as exhausted.
    AbortedDailyLimit,
    Cancelled,
}

/// Run state, logged on every transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackfillPhase {
    Idle,
    Batching,
    Fetching { batch: usize },
    Cooldown,
    NextBatch,
    Finished(RunOutcome),
}

impl fmt::Display for BackfillPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackfillPhase::Idle => write!(f, "idle"),
            BackfillPhase::Batching => write!(f, "batching"),
            BackfillPhase::Fetching { batch } => write!(f, "fetching batch {}", batch),
            BackfillPhase::Cooldown => write!(f, "cooldown"),
            BackfillPhase::NextBatch => write!(f, "next batch"),
            BackfillPhase::Finished(RunOutcome::Completed) => write!(f, "completed"),
            BackfillPhase::Finished(RunOutcome::AbortedDailyLimit) => {
                write!(f, "aborted (daily limit)")
            }
            BackfillPhase::Finished(RunOutcome::Cancelled) => write!(f, "cancelled"),
        }
    }
}

/// Counters of one bulk fundamentals run.
///
/// `processed` counts symbols whose provider call returned an outcome, so
/// `processed = successful + failed + rate_limit_hits` plus one for the call that
/// reported the daily limit, if any.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRunResult {
    pub exchange_code: String,
    pub total_symbols: usize,
    /// Symbols without cached fundamentals.
    pub symbols_without_data: usize,
    /// Of those, symbols skipped because the ledger lists them.
    pub skipped_no_data: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub rate_limit_hits: usize,
    pub daily_limit_hit: bool,
    #[serde(rename = "totalWaitTimeMs", serialize_with = "serialize_millis")]
    pub total_wait_time: Duration,
    pub batches_processed: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub outcome: RunOutcome,
}

impl BulkRunResult {
    pub fn new(exchange_code: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            exchange_code: exchange_code.into(),
            total_symbols: 0,
            symbols_without_data: 0,
            skipped_no_data: 0,
            processed: 0,
            successful: 0,
            failed: 0,
            rate_limit_hits: 0,
            daily_limit_hit: false,
            total_wait_time: Duration::ZERO,
            batches_processed: 0,
            started_at,
            completed_at: started_at,
            outcome: RunOutcome::Completed,
        }
    }
}

fn serialize_millis<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
}

/// Counters of one batch, merged into the run result when the batch settles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub rate_limit_hits: usize,
    pub daily_limit_hit: bool,
}

impl BulkRunResult {
    pub(crate) fn absorb(&mut self, batch: &BatchStats) {
        self.processed += batch.processed;
        self.successful += batch.successful;
        self.failed += batch.failed;
        self.rate_limit_hits += batch.rate_limit_hits;
        self.daily_limit_hit |= batch.daily_limit_hit;
        self.batches_processed += 1;
    }
}
