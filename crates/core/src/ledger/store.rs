use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{SymbolKey, UnavailabilityRecord};
use crate::errors::Result;

/// Durable skip-list of listings that yielded no data.
#[async_trait]
pub trait UnavailabilityLedger: Send + Sync {
    /// Record a failed attempt.
    ///
    /// Inserts the record with `failure_count = 1`, or increments the count and
    /// overwrites `last_attempted_at` and `last_error_message` if it exists.
    async fn mark_failed(&self, key: &SymbolKey, message: &str) -> Result<UnavailabilityRecord>;

    fn is_marked(&self, key: &SymbolKey) -> Result<bool>;

    /// Delete the record. Returns whether one existed.
    async fn clear(&self, key: &SymbolKey) -> Result<bool>;

    fn list_for_exchange(&self, exchange_code: &str) -> Result<Vec<UnavailabilityRecord>>;

    /// Tickers of `exchange_code` present in the ledger.
    fn marked_tickers(&self, exchange_code: &str) -> Result<HashSet<String>>;

    /// Delete records last attempted before `cutoff`. Returns the number removed.
    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
