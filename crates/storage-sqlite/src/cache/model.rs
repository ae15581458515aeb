//! Database models for cached market data.

use diesel::prelude::*;
use marketcache_core::cache::CacheStamp;
use marketcache_market_data::{Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};

use crate::errors::StorageError;
use crate::touch::RowTimes;
use crate::utils::{
    date_from_db, date_to_db, decimal_from_db, opt_decimal_from_db, time_from_db, time_to_db,
};

/// Database model for exchanges
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::exchanges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExchangeDB {
    pub code: String,
    pub name: String,
    pub operating_mic: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub country_iso2: Option<String>,
    pub country_iso3: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl ExchangeDB {
    pub fn new(exchange: &Exchange, times: &RowTimes) -> Self {
        Self {
            code: exchange.code.clone(),
            name: exchange.name.clone(),
            operating_mic: exchange.operating_mic.clone(),
            country: exchange.country.clone(),
            currency: exchange.currency.clone(),
            country_iso2: exchange.country_iso2.clone(),
            country_iso3: exchange.country_iso3.clone(),
            created_at: times.created_at.clone(),
            updated_at: times.updated_at.clone(),
            deleted_at: None,
        }
    }
}

impl From<ExchangeDB> for Exchange {
    fn from(db: ExchangeDB) -> Self {
        Self {
            code: db.code,
            name: db.name,
            operating_mic: db.operating_mic,
            country: db.country,
            currency: db.currency,
            country_iso2: db.country_iso2,
            country_iso3: db.country_iso3,
        }
    }
}

/// Database model for symbols
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::symbols)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SymbolDB {
    pub ticker: String,
    pub exchange_code: String,
    pub parent_exchange: String,
    pub name: String,
    pub symbol_type: Option<String>,
    pub isin: Option<String>,
    pub currency: Option<String>,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

impl SymbolDB {
    /// Row for `symbol` listed under `exchange_code`, whatever the payload says.
    pub fn new(exchange_code: &str, symbol: &Symbol, times: &RowTimes) -> Self {
        Self {
            ticker: symbol.ticker.clone(),
            exchange_code: exchange_code.to_string(),
            parent_exchange: symbol.parent_exchange.clone(),
            name: symbol.name.clone(),
            symbol_type: symbol.symbol_type.clone(),
            isin: symbol.isin.clone(),
            currency: symbol.currency.clone(),
            is_active: symbol.is_active,
            created_at: times.created_at.clone(),
            updated_at: times.updated_at.clone(),
            deleted_at: None,
        }
    }
}

impl From<SymbolDB> for Symbol {
    fn from(db: SymbolDB) -> Self {
        Self {
            ticker: db.ticker,
            exchange_code: db.exchange_code,
            parent_exchange: db.parent_exchange,
            name: db.name,
            symbol_type: db.symbol_type,
            isin: db.isin,
            currency: db.currency,
            is_active: db.is_active,
        }
    }
}

/// Fetch time of a whole cached list.
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::cache_stamps)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct CacheStampDB {
    pub cache_key: String,
    pub fetched_at: String,
    pub expires_at: String,
}

impl CacheStampDB {
    pub fn new(cache_key: impl Into<String>, stamp: &CacheStamp) -> Self {
        Self {
            cache_key: cache_key.into(),
            fetched_at: time_to_db(stamp.fetched_at),
            expires_at: time_to_db(stamp.expires_at),
        }
    }
}

/// Decode a `(fetched_at, expires_at)` column pair.
pub fn stamp_from_db(fetched_at: &str, expires_at: &str) -> Result<CacheStamp, StorageError> {
    Ok(CacheStamp {
        fetched_at: time_from_db(fetched_at)?,
        expires_at: time_from_db(expires_at)?,
    })
}

impl TryFrom<CacheStampDB> for CacheStamp {
    type Error = StorageError;

    fn try_from(db: CacheStampDB) -> Result<Self, Self::Error> {
        stamp_from_db(&db.fetched_at, &db.expires_at)
    }
}

/// Database model for the latest quote of a symbol
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::quotes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QuoteDB {
    pub full_symbol: String,
    pub timestamp: String,
    pub open: Option<String>,
    pub high: Option<String>,
    pub low: Option<String>,
    pub close: Option<String>,
    pub volume: Option<String>,
    pub previous_close: Option<String>,
    pub change: Option<String>,
    pub change_percent: Option<String>,
    pub fetched_at: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl QuoteDB {
    pub fn new(quote: &Quote, stamp: &CacheStamp, times: &RowTimes) -> Self {
        let text = |d: Option<rust_decimal::Decimal>| d.map(|d| d.to_string());
        Self {
            full_symbol: quote.full_symbol.clone(),
            timestamp: time_to_db(quote.timestamp),
            open: text(quote.open),
            high: text(quote.high),
            low: text(quote.low),
            close: text(quote.close),
            volume: text(quote.volume),
            previous_close: text(quote.previous_close),
            change: text(quote.change),
            change_percent: text(quote.change_percent),
            fetched_at: time_to_db(stamp.fetched_at),
            expires_at: time_to_db(stamp.expires_at),
            created_at: times.created_at.clone(),
            updated_at: times.updated_at.clone(),
        }
    }

    pub fn into_domain(self) -> Result<(Quote, CacheStamp), StorageError> {
        let stamp = stamp_from_db(&self.fetched_at, &self.expires_at)?;
        let quote = Quote {
            full_symbol: self.full_symbol,
            timestamp: time_from_db(&self.timestamp)?,
            open: opt_decimal_from_db(self.open.as_deref())?,
            high: opt_decimal_from_db(self.high.as_deref())?,
            low: opt_decimal_from_db(self.low.as_deref())?,
            close: opt_decimal_from_db(self.close.as_deref())?,
            volume: opt_decimal_from_db(self.volume.as_deref())?,
            previous_close: opt_decimal_from_db(self.previous_close.as_deref())?,
            change: opt_decimal_from_db(self.change.as_deref())?,
            change_percent: opt_decimal_from_db(self.change_percent.as_deref())?,
        };
        Ok((quote, stamp))
    }
}

/// Fetch time of one `(symbol, from, to)` history request
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::history_ranges)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct HistoryRangeDB {
    pub full_symbol: String,
    pub from_date: String,
    pub to_date: String,
    pub fetched_at: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Database model for one end-of-day bar
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::price_history)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceBarDB {
    pub full_symbol: String,
    pub date: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub adjusted_close: String,
    pub volume: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PriceBarDB {
    pub fn new(full_symbol: &str, bar: &HistoricalPrice, times: &RowTimes) -> Self {
        Self {
            full_symbol: full_symbol.to_string(),
            date: date_to_db(bar.date),
            open: bar.open.to_string(),
            high: bar.high.to_string(),
            low: bar.low.to_string(),
            close: bar.close.to_string(),
            adjusted_close: bar.adjusted_close.to_string(),
            volume: bar.volume.to_string(),
            created_at: times.created_at.clone(),
            updated_at: times.updated_at.clone(),
        }
    }
}

impl TryFrom<PriceBarDB> for HistoricalPrice {
    type Error = StorageError;

    fn try_from(db: PriceBarDB) -> Result<Self, Self::Error> {
        Ok(Self {
            date: date_from_db(&db.date)?,
            open: decimal_from_db(&db.open)?,
            high: decimal_from_db(&db.high)?,
            low: decimal_from_db(&db.low)?,
            close: decimal_from_db(&db.close)?,
            adjusted_close: decimal_from_db(&db.adjusted_close)?,
            volume: decimal_from_db(&db.volume)?,
        })
    }
}

/// Database model for a fundamentals document
#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::fundamentals)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FundamentalsDB {
    pub full_symbol: String,
    pub ticker: String,
    pub exchange_code: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    /// Raw provider document as JSON text.
    pub data: String,
    pub fetched_at: String,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl FundamentalsDB {
    pub fn new(
        ticker: &str,
        exchange_code: &str,
        fundamentals: &Fundamentals,
        stamp: &CacheStamp,
        times: &RowTimes,
    ) -> Result<Self, StorageError> {
        Ok(Self {
            full_symbol: fundamentals.full_symbol.clone(),
            ticker: ticker.to_string(),
            exchange_code: exchange_code.to_string(),
            name: fundamentals.name.clone(),
            sector: fundamentals.sector.clone(),
            industry: fundamentals.industry.clone(),
            data: serde_json::to_string(&fundamentals.data)?,
            fetched_at: time_to_db(stamp.fetched_at),
            expires_at: time_to_db(stamp.expires_at),
            created_at: times.created_at.clone(),
            updated_at: times.updated_at.clone(),
        })
    }

    pub fn into_domain(self) -> Result<(Fundamentals, CacheStamp), StorageError> {
        let stamp = stamp_from_db(&self.fetched_at, &self.expires_at)?;
        let fundamentals = Fundamentals {
            full_symbol: self.full_symbol,
            name: self.name,
            sector: self.sector,
            industry: self.industry,
            data: serde_json::from_str(&self.data)?,
        };
        Ok((fundamentals, stamp))
    }
}
