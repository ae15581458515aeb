//! Cache storage trait.
//!
//! Storage interface for every cached entity type. Implementations own the rows and
//! their bookkeeping timestamps; freshness decisions are made by the caller from the
//! returned [`CacheStamp`]s.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use marketcache_market_data::{Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};

use super::model::{CacheScope, CacheStamp, CachedEntity, Page, PageParams};
use crate::errors::Result;

/// Storage gateway for cached market data.
///
/// Reads are synchronous and served from a pooled connection; writes are async
/// because they are queued to a single writer.
///
/// # Method Naming Convention
///
/// - `*_stamp` - fetch time of a whole list, `None` if never cached
/// - `list_*` - one page of a list
/// - `replace_*` - swap a whole list for a fresh provider result
/// - `upsert_*` - insert or update one entry
#[async_trait]
pub trait MarketCacheStore: Send + Sync {
    // =========================================================================
    // Exchanges
    // =========================================================================

    fn exchanges_stamp(&self) -> Result<Option<CacheStamp>>;

    fn list_exchanges(&self, params: &PageParams) -> Result<Page<Exchange>>;

    fn exchange_exists(&self, code: &str) -> Result<bool>;

    /// Replace the exchange list. Exchanges missing from `exchanges` are soft-deleted.
    async fn replace_exchanges(
        &self,
        exchanges: &[Exchange],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize>;

    // =========================================================================
    // Symbols
    // =========================================================================

    fn symbols_stamp(&self, exchange_code: &str) -> Result<Option<CacheStamp>>;

    fn list_symbols(&self, exchange_code: &str, params: &PageParams) -> Result<Page<Symbol>>;

    /// Every active symbol of the exchange, ordered by ticker.
    fn all_symbols(&self, exchange_code: &str) -> Result<Vec<Symbol>>;

    /// Replace the symbol list of one exchange. Missing symbols are soft-deleted.
    async fn replace_symbols(
        &self,
        exchange_code: &str,
        symbols: &[Symbol],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize>;

    // =========================================================================
    // Quotes and history
    // =========================================================================

    fn get_quote(&self, full_symbol: &str) -> Result<Option<CachedEntity<Quote>>>;

    async fn upsert_quote(&self, quote: &Quote, fetched_at: DateTime<Utc>, ttl: Duration)
        -> Result<()>;

    /// Bars cached for exactly this `from..=to` request.
    fn get_history(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<CachedEntity<Vec<HistoricalPrice>>>>;

    async fn upsert_history(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        bars: &[HistoricalPrice],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize>;

    // =========================================================================
    // Fundamentals
    // =========================================================================

    fn get_fundamentals(&self, full_symbol: &str) -> Result<Option<CachedEntity<Fundamentals>>>;

    /// Tickers of `exchange_code` with cached fundamentals, fresh or not.
    fn fundamentals_symbols(&self, exchange_code: &str) -> Result<HashSet<String>>;

    async fn upsert_fundamentals(
        &self,
        fundamentals: &Fundamentals,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<()>;

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Remove every cached row of `scope`. Returns the number of rows removed.
    async fn delete_all(&self, scope: CacheScope) -> Result<usize>;
}
