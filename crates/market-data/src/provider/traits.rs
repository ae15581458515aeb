//! Market data provider trait definition.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::ProviderError;
use crate::models::{Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};

/// Raw access to the market data provider.
///
/// Implementations perform exactly one HTTP round trip per call and classify the
/// response. Rate limiting, retries, timeouts and circuit breaking are layered on top
/// by [`ProviderClient`](crate::registry::ProviderClient); implementations must not
/// add their own.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Constant identifier used in logs (e.g. "EODHD").
    fn id(&self) -> &'static str;

    /// All exchanges supported by the provider.
    async fn list_exchanges(&self) -> Result<Vec<Exchange>, ProviderError>;

    /// All symbols listed under `exchange_code`.
    async fn list_symbols(&self, exchange_code: &str) -> Result<Vec<Symbol>, ProviderError>;

    /// Latest quote for a `TICKER.EXCHANGE` symbol.
    async fn get_quote(&self, full_symbol: &str) -> Result<Quote, ProviderError>;

    /// Daily bars between `from` and `to` (inclusive), ordered by date ascending.
    async fn get_historical_prices(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoricalPrice>, ProviderError>;

    /// Fundamentals document. An empty document is reported as [`ProviderError::NotFound`].
    async fn get_fundamentals(&self, full_symbol: &str) -> Result<Fundamentals, ProviderError>;
}
