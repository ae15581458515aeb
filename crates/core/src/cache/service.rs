//! Read-through cache over the provider client.
//!
//! Every read follows the same path:
//!
//! ```text
//! fresh in store? ──yes──► serve from store (source = cache)
//!       │ no / forced
//!       ▼
//! per-key lock ──► re-check (non-forced) ──► ProviderClient ──► store write ──► re-query
//!                                                  │                   │
//!                                            error returned     failure logged,
//!                                            cache untouched    fetched data served
//! ```

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use log::{debug, warn};
use marketcache_market_data::{
    Exchange, Fundamentals, HistoricalPrice, ProviderClient, ProviderError, Quote, Symbol,
};
use tokio_util::sync::CancellationToken;

use super::model::{CacheStamp, CachedResponse, Page, PageParams};
use super::single_flight::KeyedLocks;
use super::store::MarketCacheStore;
use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::ledger::{SymbolKey, UnavailabilityLedger};
use crate::settings::CacheSettings;

const EXCHANGES_KEY: &str = "exchanges";

/// Cache read-through gate for interactive reads.
pub struct MarketDataCache {
    client: Arc<ProviderClient>,
    store: Arc<dyn MarketCacheStore>,
    ledger: Arc<dyn UnavailabilityLedger>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    in_flight: KeyedLocks,
    cancel: CancellationToken,
}

impl MarketDataCache {
    pub fn new(
        client: Arc<ProviderClient>,
        store: Arc<dyn MarketCacheStore>,
        ledger: Arc<dyn UnavailabilityLedger>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        Self {
            client,
            store,
            ledger,
            clock,
            settings,
            in_flight: KeyedLocks::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Cancel provider calls waiting for a permit when `cancel` fires (process shutdown).
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    pub async fn get_exchanges(
        &self,
        force_refresh: bool,
        params: &PageParams,
    ) -> Result<CachedResponse<Page<Exchange>>> {
        let params = params.normalized();
        let store = &self.store;
        let ttl = self.settings.exchanges_ttl;

        self.get_or_refresh(
            EXCHANGES_KEY,
            force_refresh,
            ttl,
            |now| match store.exchanges_stamp()? {
                Some(stamp) if stamp.is_fresh(now) => Ok(Some(CachedResponse::from_cache(
                    store.list_exchanges(&params)?,
                    &stamp,
                    now,
                ))),
                _ => Ok(None),
            },
            || self.client.list_exchanges(&self.cancel),
            |exchanges: Vec<Exchange>, stamp: CacheStamp| {
                let params = &params;
                async move {
                    let written = store
                        .replace_exchanges(&exchanges, stamp.fetched_at, ttl)
                        .await
                        .and_then(|_| store.list_exchanges(params));
                    match written {
                        Ok(page) => page,
                        Err(e) => {
                            warn!("Failed to cache {} exchanges: {}", exchanges.len(), e);
                            params.apply(exchanges, |x| x.code.as_str(), |x| x.name.as_str())
                        }
                    }
                }
            },
        )
        .await
    }

    /// Symbols of one exchange. `NotFound` if the exchange is unknown to the provider.
    pub async fn get_symbols(
        &self,
        exchange_code: &str,
        force_refresh: bool,
        params: &PageParams,
    ) -> Result<CachedResponse<Page<Symbol>>> {
        let exchange_code = exchange_code.trim();
        if exchange_code.is_empty() {
            return Err(Error::Validation("exchange code is required".to_string()));
        }
        self.ensure_exchange_known(exchange_code).await?;

        let params = params.normalized();
        let store = &self.store;
        let ttl = self.settings.symbols_ttl;
        let key = format!("symbols:{}", exchange_code);

        self.get_or_refresh(
            &key,
            force_refresh,
            ttl,
            |now| match store.symbols_stamp(exchange_code)? {
                Some(stamp) if stamp.is_fresh(now) => Ok(Some(CachedResponse::from_cache(
                    store.list_symbols(exchange_code, &params)?,
                    &stamp,
                    now,
                ))),
                _ => Ok(None),
            },
            || self.client.list_symbols(exchange_code, &self.cancel),
            |symbols: Vec<Symbol>, stamp: CacheStamp| {
                let params = &params;
                async move {
                    let written = store
                        .replace_symbols(exchange_code, &symbols, stamp.fetched_at, ttl)
                        .await
                        .and_then(|_| store.list_symbols(exchange_code, params));
                    match written {
                        Ok(page) => page,
                        Err(e) => {
                            warn!(
                                "Failed to cache {} symbols for {}: {}",
                                symbols.len(),
                                exchange_code,
                                e
                            );
                            params.apply(symbols, |s| s.ticker.as_str(), |s| s.name.as_str())
                        }
                    }
                }
            },
        )
        .await
    }

    pub async fn get_quote(
        &self,
        full_symbol: &str,
        force_refresh: bool,
    ) -> Result<CachedResponse<Quote>> {
        let full_symbol = SymbolKey::parse(full_symbol)?.full_symbol();
        let full_symbol = full_symbol.as_str();
        let store = &self.store;
        let ttl = self.settings.quotes_ttl;

        self.get_or_refresh(
            &format!("quote:{}", full_symbol),
            force_refresh,
            ttl,
            |now| {
                Ok(store
                    .get_quote(full_symbol)?
                    .filter(|entry| entry.is_fresh(now))
                    .map(|entry| {
                        let stamp = entry.stamp();
                        CachedResponse::from_cache(entry.payload, &stamp, now)
                    }))
            },
            || self.client.get_quote(full_symbol, &self.cancel),
            |quote: Quote, stamp: CacheStamp| async move {
                if let Err(e) = store.upsert_quote(&quote, stamp.fetched_at, ttl).await {
                    warn!("Failed to cache quote for {}: {}", full_symbol, e);
                }
                quote
            },
        )
        .await
    }

    /// Daily bars for `from..=to`. Each distinct range is cached on its own.
    pub async fn get_historical_prices(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        force_refresh: bool,
    ) -> Result<CachedResponse<Vec<HistoricalPrice>>> {
        let full_symbol = SymbolKey::parse(full_symbol)?.full_symbol();
        let full_symbol = full_symbol.as_str();
        if from > to {
            return Err(Error::Validation(format!(
                "start date {} is after end date {}",
                from, to
            )));
        }
        let store = &self.store;
        let ttl = self.settings.history_ttl;

        self.get_or_refresh(
            &format!("history:{}:{}:{}", full_symbol, from, to),
            force_refresh,
            ttl,
            |now| {
                Ok(store
                    .get_history(full_symbol, from, to)?
                    .filter(|entry| entry.is_fresh(now))
                    .map(|entry| {
                        let stamp = entry.stamp();
                        CachedResponse::from_cache(entry.payload, &stamp, now)
                    }))
            },
            || {
                self.client
                    .get_historical_prices(full_symbol, from, to, &self.cancel)
            },
            |bars: Vec<HistoricalPrice>, stamp: CacheStamp| async move {
                if let Err(e) = store
                    .upsert_history(full_symbol, from, to, &bars, stamp.fetched_at, ttl)
                    .await
                {
                    warn!("Failed to cache history for {}: {}", full_symbol, e);
                }
                bars
            },
        )
        .await
    }

    /// Fundamentals of one symbol. A successful fetch clears the symbol's ledger record.
    ///
    /// Provider failures are returned as-is and never written to the ledger here;
    /// only bulk runs decide that a listing has no data.
    pub async fn get_fundamentals(
        &self,
        full_symbol: &str,
        force_refresh: bool,
    ) -> Result<CachedResponse<Fundamentals>> {
        let key = SymbolKey::parse(full_symbol)?;
        let full_symbol = key.full_symbol();
        let full_symbol = full_symbol.as_str();
        let store = &self.store;
        let ledger = &self.ledger;
        let ttl = self.settings.fundamentals_ttl;

        self.get_or_refresh(
            &format!("fundamentals:{}", full_symbol),
            force_refresh,
            ttl,
            |now| {
                Ok(store
                    .get_fundamentals(full_symbol)?
                    .filter(|entry| entry.is_fresh(now))
                    .map(|entry| {
                        let stamp = entry.stamp();
                        CachedResponse::from_cache(entry.payload, &stamp, now)
                    }))
            },
            || self.client.get_fundamentals(full_symbol, &self.cancel),
            |fundamentals: Fundamentals, stamp: CacheStamp| {
                let key = &key;
                async move {
                    if let Err(e) = store
                        .upsert_fundamentals(&fundamentals, stamp.fetched_at, ttl)
                        .await
                    {
                        warn!("Failed to cache fundamentals for {}: {}", full_symbol, e);
                    }
                    if let Err(e) = ledger.clear(key).await {
                        warn!("Failed to clear ledger record for {}: {}", key, e);
                    }
                    fundamentals
                }
            },
        )
        .await
    }

    /// Make sure `code` is a known exchange, refreshing the exchange list if needed.
    async fn ensure_exchange_known(&self, code: &str) -> Result<()> {
        if self.store.exchange_exists(code)? {
            return Ok(());
        }

        let refreshed = self.get_exchanges(false, &PageParams::default()).await?;
        if self.store.exchange_exists(code)? {
            return Ok(());
        }
        debug!(
            "Exchange {} not among {} known exchanges",
            code, refreshed.data.total
        );
        Err(Error::NotFound(format!("Exchange '{}' not found", code)))
    }

    /// Serve from `lookup` when fresh, otherwise fetch, persist and tag as provider data.
    ///
    /// `lookup` returns `Some` only for a fresh entry. `persist` writes the payload and
    /// returns what the caller sees; it handles its own write failures.
    async fn get_or_refresh<T, P, L, F, FFut, W, WFut>(
        &self,
        key: &str,
        force_refresh: bool,
        ttl: Duration,
        lookup: L,
        fetch: F,
        persist: W,
    ) -> Result<CachedResponse<T>>
    where
        L: Fn(DateTime<Utc>) -> Result<Option<CachedResponse<T>>>,
        F: FnOnce() -> FFut,
        FFut: Future<Output = std::result::Result<P, ProviderError>>,
        W: FnOnce(P, CacheStamp) -> WFut,
        WFut: Future<Output = T>,
    {
        if !force_refresh {
            if let Some(hit) = lookup(self.clock.now())? {
                debug!("Cache hit for {}", key);
                return Ok(hit);
            }
        }

        let _guard = self.in_flight.lock(key).await;

        if !force_refresh {
            if let Some(hit) = lookup(self.clock.now())? {
                debug!("Cache filled by a concurrent refresh for {}", key);
                return Ok(hit);
            }
        }

        debug!("Refreshing {} from provider", key);
        let payload = fetch().await?;

        let stamp = CacheStamp::new(self.clock.now(), ttl);
        let data = persist(payload, stamp).await;
        Ok(CachedResponse::from_provider(data, &stamp))
    }
}
