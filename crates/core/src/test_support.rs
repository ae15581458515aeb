//! Hand-written fakes shared by the service tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use marketcache_market_data::{
    CircuitBreakerConfig, Exchange, Fundamentals, HistoricalPrice, MarketDataProvider,
    ProviderClient, ProviderClientConfig, ProviderError, Quote, RateGovernor, RetryPolicy,
    Symbol,
};
use serde_json::json;

use crate::cache::{CacheScope, CacheStamp, CachedEntity, MarketCacheStore, Page, PageParams};
use crate::clock::Clock;
use crate::errors::{DatabaseError, Error, Result};
use crate::ledger::{SymbolKey, UnavailabilityLedger, UnavailabilityRecord};

// =========================================================================
// Builders
// =========================================================================

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap()
}

pub fn exchange(code: &str) -> Exchange {
    Exchange {
        code: code.to_string(),
        name: format!("{} Exchange", code),
        operating_mic: None,
        country: None,
        currency: None,
        country_iso2: None,
        country_iso3: None,
    }
}

pub fn symbol(ticker: &str, exchange_code: &str) -> Symbol {
    Symbol {
        ticker: ticker.to_string(),
        exchange_code: exchange_code.to_string(),
        parent_exchange: exchange_code.to_string(),
        name: format!("{} plc", ticker),
        symbol_type: Some("Common Stock".to_string()),
        isin: None,
        currency: None,
        is_active: true,
    }
}

pub fn fundamentals(full_symbol: &str) -> Fundamentals {
    Fundamentals::from_document(
        full_symbol,
        json!({"General": {"Name": full_symbol, "Sector": "Technology"}}),
    )
}

pub fn client_for(provider: Arc<FakeProvider>) -> Arc<ProviderClient> {
    client_with_governor(provider, Arc::new(RateGovernor::default()))
}

pub fn client_with_governor(
    provider: Arc<FakeProvider>,
    governor: Arc<RateGovernor>,
) -> Arc<ProviderClient> {
    let config = ProviderClientConfig {
        call_timeout: StdDuration::from_secs(30),
        retry: RetryPolicy::none(),
        circuit_breaker: CircuitBreakerConfig {
            failure_threshold: 1_000,
            ..Default::default()
        },
    };
    Arc::new(ProviderClient::new(provider, governor, config))
}

// =========================================================================
// Clock
// =========================================================================

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =========================================================================
// Provider
// =========================================================================

/// Provider serving canned lists and scripted fundamentals outcomes.
#[derive(Default)]
pub struct FakeProvider {
    pub exchanges: Mutex<Vec<Exchange>>,
    pub symbols: Mutex<HashMap<String, Vec<Symbol>>>,
    /// Error returned by every list/quote/history call while set.
    pub failure: Mutex<Option<ProviderError>>,
    /// Per full symbol fundamentals failures.
    pub fundamentals_failures: Mutex<HashMap<String, ProviderError>>,
    /// Fundamentals outcomes consumed in call order, ahead of `fundamentals_failures`.
    pub fundamentals_script: Mutex<VecDeque<std::result::Result<(), ProviderError>>>,
    /// Calls answered with `DailyLimitExceeded` once this many fundamentals calls were made.
    pub daily_limit_after: Mutex<Option<usize>>,
    pub delay: Mutex<Option<StdDuration>>,
    pub calls: AtomicUsize,
    pub fundamentals_calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_exchanges(self: Arc<Self>, codes: &[&str]) -> Arc<Self> {
        *self.exchanges.lock().unwrap() = codes.iter().map(|c| exchange(c)).collect();
        self
    }

    pub fn with_symbols(self: Arc<Self>, exchange_code: &str, symbols: Vec<Symbol>) -> Arc<Self> {
        self.symbols
            .lock()
            .unwrap()
            .insert(exchange_code.to_string(), symbols);
        self
    }

    pub fn with_delay(self: Arc<Self>, delay: StdDuration) -> Arc<Self> {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn fail_with(&self, error: Option<ProviderError>) {
        *self.failure.lock().unwrap() = error;
    }

    pub fn fail_fundamentals(&self, full_symbol: &str, error: ProviderError) {
        self.fundamentals_failures
            .lock()
            .unwrap()
            .insert(full_symbol.to_string(), error);
    }

    pub fn script_fundamentals(&self, outcomes: Vec<std::result::Result<(), ProviderError>>) {
        *self.fundamentals_script.lock().unwrap() = outcomes.into();
    }

    pub fn daily_limit_after(&self, calls: usize) {
        *self.daily_limit_after.lock().unwrap() = Some(calls);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fundamentals_requested(&self) -> Vec<String> {
        self.fundamentals_calls.lock().unwrap().clone()
    }

    async fn enter(&self) -> std::result::Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MarketDataProvider for FakeProvider {
    fn id(&self) -> &'static str {
        "FAKE"
    }

    async fn list_exchanges(&self) -> std::result::Result<Vec<Exchange>, ProviderError> {
        self.enter().await?;
        Ok(self.exchanges.lock().unwrap().clone())
    }

    async fn list_symbols(
        &self,
        exchange_code: &str,
    ) -> std::result::Result<Vec<Symbol>, ProviderError> {
        self.enter().await?;
        self.symbols
            .lock()
            .unwrap()
            .get(exchange_code)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(exchange_code.to_string()))
    }

    async fn get_quote(&self, full_symbol: &str) -> std::result::Result<Quote, ProviderError> {
        self.enter().await?;
        Ok(Quote {
            full_symbol: full_symbol.to_string(),
            timestamp: t0(),
            open: None,
            high: None,
            low: None,
            close: Some(rust_decimal_macros::dec!(189.5)),
            volume: None,
            previous_close: None,
            change: None,
            change_percent: None,
        })
    }

    async fn get_historical_prices(
        &self,
        _full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> std::result::Result<Vec<HistoricalPrice>, ProviderError> {
        self.enter().await?;
        let price = rust_decimal_macros::dec!(10);
        Ok(from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| HistoricalPrice {
                date,
                open: price,
                high: price,
                low: price,
                close: price,
                adjusted_close: price,
                volume: price,
            })
            .collect())
    }

    async fn get_fundamentals(
        &self,
        full_symbol: &str,
    ) -> std::result::Result<Fundamentals, ProviderError> {
        let call_no = {
            let mut calls = self.fundamentals_calls.lock().unwrap();
            calls.push(full_symbol.to_string());
            calls.len()
        };
        self.enter().await?;

        if let Some(limit) = *self.daily_limit_after.lock().unwrap() {
            if call_no > limit {
                return Err(ProviderError::DailyLimitExceeded {
                    message: "Daily limit exceeded".to_string(),
                });
            }
        }
        if let Some(scripted) = self.fundamentals_script.lock().unwrap().pop_front() {
            scripted?;
            return Ok(fundamentals(full_symbol));
        }
        match self.fundamentals_failures.lock().unwrap().get(full_symbol) {
            Some(error) => Err(error.clone()),
            None => Ok(fundamentals(full_symbol)),
        }
    }
}

// =========================================================================
// Store
// =========================================================================

#[derive(Default)]
pub struct StoreState {
    pub exchanges: Vec<Exchange>,
    pub exchanges_stamp: Option<CacheStamp>,
    pub symbols: HashMap<String, Vec<Symbol>>,
    pub symbol_stamps: HashMap<String, CacheStamp>,
    pub quotes: HashMap<String, CachedEntity<Quote>>,
    pub history: HashMap<(String, NaiveDate, NaiveDate), CachedEntity<Vec<HistoricalPrice>>>,
    pub fundamentals: HashMap<String, CachedEntity<Fundamentals>>,
    pub fail_writes: bool,
    pub writes: usize,
}

#[derive(Clone, Default)]
pub struct MockStore {
    pub state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_exchanges(&self, codes: &[&str], stamp: CacheStamp) {
        let mut state = self.state.lock().unwrap();
        state.exchanges = codes.iter().map(|c| exchange(c)).collect();
        state.exchanges_stamp = Some(stamp);
    }

    pub fn seed_symbols(&self, exchange_code: &str, symbols: Vec<Symbol>, stamp: CacheStamp) {
        let mut state = self.state.lock().unwrap();
        state.symbols.insert(exchange_code.to_string(), symbols);
        state.symbol_stamps.insert(exchange_code.to_string(), stamp);
    }

    pub fn seed_fundamentals(&self, full_symbol: &str, stamp: CacheStamp) {
        self.state.lock().unwrap().fundamentals.insert(
            full_symbol.to_string(),
            CachedEntity::new(fundamentals(full_symbol), stamp),
        );
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_writes = fail;
    }

    pub fn has_fundamentals(&self, full_symbol: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .fundamentals
            .contains_key(full_symbol)
    }

    pub fn fundamentals_count(&self) -> usize {
        self.state.lock().unwrap().fundamentals.len()
    }

    fn write(&self) -> Result<std::sync::MutexGuard<'_, StoreState>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_writes {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "Intentional write failure".into(),
            )));
        }
        state.writes += 1;
        Ok(state)
    }
}

#[async_trait]
impl MarketCacheStore for MockStore {
    fn exchanges_stamp(&self) -> Result<Option<CacheStamp>> {
        Ok(self.state.lock().unwrap().exchanges_stamp)
    }

    fn list_exchanges(&self, params: &PageParams) -> Result<Page<Exchange>> {
        let items = self.state.lock().unwrap().exchanges.clone();
        Ok(params.apply(items, |x| x.code.as_str(), |x| x.name.as_str()))
    }

    fn exchange_exists(&self, code: &str) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .exchanges
            .iter()
            .any(|x| x.code == code))
    }

    async fn replace_exchanges(
        &self,
        exchanges: &[Exchange],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize> {
        let mut state = self.write()?;
        state.exchanges = exchanges.to_vec();
        state.exchanges_stamp = Some(CacheStamp::new(fetched_at, ttl));
        Ok(exchanges.len())
    }

    fn symbols_stamp(&self, exchange_code: &str) -> Result<Option<CacheStamp>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .symbol_stamps
            .get(exchange_code)
            .copied())
    }

    fn list_symbols(&self, exchange_code: &str, params: &PageParams) -> Result<Page<Symbol>> {
        let items = self.all_symbols(exchange_code)?;
        Ok(params.apply(items, |s| s.ticker.as_str(), |s| s.name.as_str()))
    }

    fn all_symbols(&self, exchange_code: &str) -> Result<Vec<Symbol>> {
        let mut items = self
            .state
            .lock()
            .unwrap()
            .symbols
            .get(exchange_code)
            .cloned()
            .unwrap_or_default();
        items.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(items)
    }

    async fn replace_symbols(
        &self,
        exchange_code: &str,
        symbols: &[Symbol],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize> {
        let mut state = self.write()?;
        state
            .symbols
            .insert(exchange_code.to_string(), symbols.to_vec());
        state
            .symbol_stamps
            .insert(exchange_code.to_string(), CacheStamp::new(fetched_at, ttl));
        Ok(symbols.len())
    }

    fn get_quote(&self, full_symbol: &str) -> Result<Option<CachedEntity<Quote>>> {
        Ok(self.state.lock().unwrap().quotes.get(full_symbol).cloned())
    }

    async fn upsert_quote(
        &self,
        quote: &Quote,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<()> {
        let mut state = self.write()?;
        state.quotes.insert(
            quote.full_symbol.clone(),
            CachedEntity::new(quote.clone(), CacheStamp::new(fetched_at, ttl)),
        );
        Ok(())
    }

    fn get_history(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<CachedEntity<Vec<HistoricalPrice>>>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .history
            .get(&(full_symbol.to_string(), from, to))
            .cloned())
    }

    async fn upsert_history(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        bars: &[HistoricalPrice],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize> {
        let mut state = self.write()?;
        state.history.insert(
            (full_symbol.to_string(), from, to),
            CachedEntity::new(bars.to_vec(), CacheStamp::new(fetched_at, ttl)),
        );
        Ok(bars.len())
    }

    fn get_fundamentals(&self, full_symbol: &str) -> Result<Option<CachedEntity<Fundamentals>>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .fundamentals
            .get(full_symbol)
            .cloned())
    }

    fn fundamentals_symbols(&self, exchange_code: &str) -> Result<HashSet<String>> {
        let suffix = format!(".{}", exchange_code);
        Ok(self
            .state
            .lock()
            .unwrap()
            .fundamentals
            .keys()
            .filter_map(|full| full.strip_suffix(&suffix).map(str::to_string))
            .collect())
    }

    async fn upsert_fundamentals(
        &self,
        fundamentals: &Fundamentals,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<()> {
        let mut state = self.write()?;
        state.fundamentals.insert(
            fundamentals.full_symbol.clone(),
            CachedEntity::new(fundamentals.clone(), CacheStamp::new(fetched_at, ttl)),
        );
        Ok(())
    }

    async fn delete_all(&self, scope: CacheScope) -> Result<usize> {
        let mut state = self.write()?;
        let removed = match scope {
            CacheScope::Exchanges => {
                state.exchanges_stamp = None;
                std::mem::take(&mut state.exchanges).len()
            }
            CacheScope::Symbols(code) => {
                state.symbol_stamps.remove(&code);
                state.symbols.remove(&code).map(|s| s.len()).unwrap_or(0)
            }
            CacheScope::Quotes => std::mem::take(&mut state.quotes).len(),
            CacheScope::History => std::mem::take(&mut state.history).len(),
            CacheScope::Fundamentals => std::mem::take(&mut state.fundamentals).len(),
        };
        Ok(removed)
    }
}

// =========================================================================
// Ledger
// =========================================================================

#[derive(Default)]
pub struct MockLedger {
    pub records: Mutex<HashMap<SymbolKey, UnavailabilityRecord>>,
    pub now: Mutex<Option<DateTime<Utc>>>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn record(&self, full_symbol: &str) -> Option<UnavailabilityRecord> {
        let key = SymbolKey::parse(full_symbol).unwrap();
        self.records.lock().unwrap().get(&key).cloned()
    }

    fn now(&self) -> DateTime<Utc> {
        self.now.lock().unwrap().unwrap_or_else(t0)
    }
}

#[async_trait]
impl UnavailabilityLedger for MockLedger {
    async fn mark_failed(&self, key: &SymbolKey, message: &str) -> Result<UnavailabilityRecord> {
        let now = self.now();
        let mut records = self.records.lock().unwrap();
        let record = records
            .entry(key.clone())
            .and_modify(|r| {
                r.failure_count += 1;
                r.last_attempted_at = now;
                r.last_error_message = Some(message.to_string());
            })
            .or_insert_with(|| UnavailabilityRecord {
                ticker: key.ticker.clone(),
                exchange_code: key.exchange_code.clone(),
                failure_count: 1,
                first_failed_at: now,
                last_attempted_at: now,
                last_error_message: Some(message.to_string()),
            });
        Ok(record.clone())
    }

    fn is_marked(&self, key: &SymbolKey) -> Result<bool> {
        Ok(self.records.lock().unwrap().contains_key(key))
    }

    async fn clear(&self, key: &SymbolKey) -> Result<bool> {
        Ok(self.records.lock().unwrap().remove(key).is_some())
    }

    fn list_for_exchange(&self, exchange_code: &str) -> Result<Vec<UnavailabilityRecord>> {
        let mut records: Vec<_> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.exchange_code == exchange_code)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        Ok(records)
    }

    fn marked_tickers(&self, exchange_code: &str) -> Result<HashSet<String>> {
        Ok(self
            .list_for_exchange(exchange_code)?
            .into_iter()
            .map(|r| r.ticker)
            .collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, r| r.last_attempted_at >= cutoff);
        Ok(before - records.len())
    }
}
