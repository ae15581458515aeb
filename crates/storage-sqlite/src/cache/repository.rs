use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::{Sqlite, SqliteConnection};
use marketcache_core::cache::{
    CacheScope, CacheStamp, CachedEntity, MarketCacheStore, Page, PageParams, SortOrder,
};
use marketcache_core::errors::{Error, Result};
use marketcache_market_data::{
    split_full_symbol, Exchange, Fundamentals, HistoricalPrice, Quote, Symbol,
};

use super::model::{
    stamp_from_db, CacheStampDB, ExchangeDB, FundamentalsDB, HistoryRangeDB, PriceBarDB, QuoteDB,
    SymbolDB,
};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::{
    cache_stamps, exchanges, fundamentals, history_ranges, price_history, quotes, symbols,
};
use crate::touch;
use crate::utils::{chunk_for_sqlite, date_to_db, like_pattern, time_to_db};

const EXCHANGES_KEY: &str = "exchanges";

fn symbols_key(exchange_code: &str) -> String {
    format!("symbols:{}", exchange_code)
}

fn exchange_query(filter: Option<&str>) -> exchanges::BoxedQuery<'static, Sqlite> {
    let mut query = exchanges::table
        .filter(exchanges::deleted_at.is_null())
        .into_boxed();
    if let Some(filter) = filter {
        let pattern = like_pattern(filter);
        query = query.filter(
            exchanges::code
                .like(pattern.clone())
                .escape('\\')
                .or(exchanges::name.like(pattern).escape('\\')),
        );
    }
    query
}

fn symbol_query(exchange_code: &str, filter: Option<&str>) -> symbols::BoxedQuery<'static, Sqlite> {
    let mut query = symbols::table
        .filter(symbols::exchange_code.eq(exchange_code.to_string()))
        .filter(symbols::deleted_at.is_null())
        .into_boxed();
    if let Some(filter) = filter {
        let pattern = like_pattern(filter);
        query = query.filter(
            symbols::ticker
                .like(pattern.clone())
                .escape('\\')
                .or(symbols::name.like(pattern).escape('\\')),
        );
    }
    query
}

fn load_stamp(conn: &mut SqliteConnection, key: &str) -> Result<Option<CacheStamp>> {
    let row = cache_stamps::table
        .find(key)
        .select(CacheStampDB::as_select())
        .first::<CacheStampDB>(conn)
        .optional()
        .into_core()?;
    row.map(CacheStamp::try_from).transpose().into_core()
}

fn to_offset(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_count(value: i64) -> usize {
    usize::try_from(value).unwrap_or(0)
}

/// SQLite implementation of [`MarketCacheStore`].
pub struct MarketCacheRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl MarketCacheRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

#[async_trait]
impl MarketCacheStore for MarketCacheRepository {
    // =========================================================================
    // Exchanges
    // =========================================================================

    fn exchanges_stamp(&self) -> Result<Option<CacheStamp>> {
        let mut conn = get_connection(&self.pool)?;
        load_stamp(&mut conn, EXCHANGES_KEY)
    }

    fn list_exchanges(&self, params: &PageParams) -> Result<Page<Exchange>> {
        let params = params.normalized();
        let mut conn = get_connection(&self.pool)?;

        let total: i64 = exchange_query(params.filter.as_deref())
            .select(count_star())
            .first(&mut conn)
            .into_core()?;

        let query = exchange_query(params.filter.as_deref());
        let query = match params.sort {
            SortOrder::Asc => query.order(exchanges::code.asc()),
            SortOrder::Desc => query.order(exchanges::code.desc()),
        };
        let rows = query
            .offset(to_offset(params.offset()))
            .limit(to_offset(params.page_size))
            .select(ExchangeDB::as_select())
            .load::<ExchangeDB>(&mut conn)
            .into_core()?;

        Ok(Page {
            items: rows.into_iter().map(Exchange::from).collect(),
            total: to_count(total),
            page: params.page,
            page_size: params.page_size,
        })
    }

    fn exchange_exists(&self, code: &str) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = exchanges::table
            .filter(exchanges::code.eq(code))
            .filter(exchanges::deleted_at.is_null())
            .select(count_star())
            .first(&mut conn)
            .into_core()?;
        Ok(count > 0)
    }

    async fn replace_exchanges(
        &self,
        items: &[Exchange],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize> {
        let times = touch::on_insert(fetched_at);
        let updated_at = touch::on_update(fetched_at);
        let tombstone = touch::on_delete(fetched_at);
        let rows: Vec<ExchangeDB> = items.iter().map(|e| ExchangeDB::new(e, &times)).collect();
        let stamp = CacheStampDB::new(EXCHANGES_KEY, &CacheStamp::new(fetched_at, ttl));

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                for row in &rows {
                    diesel::insert_into(exchanges::table)
                        .values(row)
                        .on_conflict(exchanges::code)
                        .do_update()
                        .set((
                            exchanges::name.eq(&row.name),
                            exchanges::operating_mic.eq(&row.operating_mic),
                            exchanges::country.eq(&row.country),
                            exchanges::currency.eq(&row.currency),
                            exchanges::country_iso2.eq(&row.country_iso2),
                            exchanges::country_iso3.eq(&row.country_iso3),
                            exchanges::updated_at.eq(&updated_at),
                            exchanges::deleted_at.eq(None::<String>),
                        ))
                        .execute(conn)
                        .into_core()?;
                }

                let incoming: HashSet<&str> = rows.iter().map(|r| r.code.as_str()).collect();
                let stale: Vec<String> = exchanges::table
                    .filter(exchanges::deleted_at.is_null())
                    .select(exchanges::code)
                    .load::<String>(conn)
                    .into_core()?
                    .into_iter()
                    .filter(|code| !incoming.contains(code.as_str()))
                    .collect();
                for chunk in chunk_for_sqlite(&stale) {
                    diesel::update(exchanges::table.filter(exchanges::code.eq_any(chunk)))
                        .set((
                            exchanges::updated_at.eq(&tombstone.updated_at),
                            exchanges::deleted_at.eq(&tombstone.deleted_at),
                        ))
                        .execute(conn)
                        .into_core()?;
                }

                diesel::replace_into(cache_stamps::table)
                    .values(&stamp)
                    .execute(conn)
                    .into_core()?;
                Ok(incoming.len())
            })
            .await
    }

    // =========================================================================
    // Symbols
    // =========================================================================

    fn symbols_stamp(&self, exchange_code: &str) -> Result<Option<CacheStamp>> {
        let mut conn = get_connection(&self.pool)?;
        load_stamp(&mut conn, &symbols_key(exchange_code))
    }

    fn list_symbols(&self, exchange_code: &str, params: &PageParams) -> Result<Page<Symbol>> {
        let params = params.normalized();
        let mut conn = get_connection(&self.pool)?;

        let total: i64 = symbol_query(exchange_code, params.filter.as_deref())
            .select(count_star())
            .first(&mut conn)
            .into_core()?;

        let query = symbol_query(exchange_code, params.filter.as_deref());
        let query = match params.sort {
            SortOrder::Asc => query.order(symbols::ticker.asc()),
            SortOrder::Desc => query.order(symbols::ticker.desc()),
        };
        let rows = query
            .offset(to_offset(params.offset()))
            .limit(to_offset(params.page_size))
            .select(SymbolDB::as_select())
            .load::<SymbolDB>(&mut conn)
            .into_core()?;

        Ok(Page {
            items: rows.into_iter().map(Symbol::from).collect(),
            total: to_count(total),
            page: params.page,
            page_size: params.page_size,
        })
    }

    fn all_symbols(&self, exchange_code: &str) -> Result<Vec<Symbol>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = symbol_query(exchange_code, None)
            .order(symbols::ticker.asc())
            .select(SymbolDB::as_select())
            .load::<SymbolDB>(&mut conn)
            .into_core()?;
        Ok(rows.into_iter().map(Symbol::from).collect())
    }

    async fn replace_symbols(
        &self,
        exchange_code: &str,
        items: &[Symbol],
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<usize> {
        let code = exchange_code.to_string();
        let times = touch::on_insert(fetched_at);
        let updated_at = touch::on_update(fetched_at);
        let tombstone = touch::on_delete(fetched_at);
        let rows: Vec<SymbolDB> = items
            .iter()
            .map(|s| SymbolDB::new(&code, s, &times))
            .collect();
        let stamp = CacheStampDB::new(symbols_key(&code), &CacheStamp::new(fetched_at, ttl));

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                for row in &rows {
                    diesel::insert_into(symbols::table)
                        .values(row)
                        .on_conflict((symbols::ticker, symbols::exchange_code))
                        .do_update()
                        .set((
                            symbols::parent_exchange.eq(&row.parent_exchange),
                            symbols::name.eq(&row.name),
                            symbols::symbol_type.eq(&row.symbol_type),
                            symbols::isin.eq(&row.isin),
                            symbols::currency.eq(&row.currency),
                            symbols::is_active.eq(row.is_active),
                            symbols::updated_at.eq(&updated_at),
                            symbols::deleted_at.eq(None::<String>),
                        ))
                        .execute(conn)
                        .into_core()?;
                }

                let incoming: HashSet<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
                let stale: Vec<String> = symbols::table
                    .filter(symbols::exchange_code.eq(&code))
                    .filter(symbols::deleted_at.is_null())
                    .select(symbols::ticker)
                    .load::<String>(conn)
                    .into_core()?
                    .into_iter()
                    .filter(|ticker| !incoming.contains(ticker.as_str()))
                    .collect();
                for chunk in chunk_for_sqlite(&stale) {
                    diesel::update(
                        symbols::table
                            .filter(symbols::exchange_code.eq(&code))
                            .filter(symbols::ticker.eq_any(chunk)),
                    )
                    .set((
                        symbols::updated_at.eq(&tombstone.updated_at),
                        symbols::deleted_at.eq(&tombstone.deleted_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                }

                diesel::replace_into(cache_stamps::table)
                    .values(&stamp)
                    .execute(conn)
                    .into_core()?;
                Ok(incoming.len())
            })
            .await
    }

    // =========================================================================
    // Quotes and history
    // =========================================================================

    fn get_quote(&self, full_symbol: &str) -> Result<Option<CachedEntity<Quote>>> {
        let mut conn = get_connection(&self.pool)?;
        let row = quotes::table
            .find(full_symbol)
            .select(QuoteDB::as_select())
            .first::<QuoteDB>(&mut conn)
            .optional()
            .into_core()?;

        match row {
            Some(row) => {
                let (quote, stamp) = row.into_domain().into_core()?;
                Ok(Some(CachedEntity::new(quote, stamp)))
            }
            None => Ok(None),
        }
    }

    async fn upsert_quote(
        &self,
        quote: &Quote,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<()> {
        let row = QuoteDB::new(
            quote,
            &CacheStamp::new(fetched_at, ttl),
            &touch::on_insert(fetched_at),
        );
        let updated_at = touch::on_update(fetched_at);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(quotes::table)
                    .values(&row)
                    .on_conflict(quotes::full_symbol)
                    .do_update()
                    .set((
                        quotes::timestamp.eq(&row.timestamp),
                        quotes::open.eq(&row.open),
                        quotes::high.eq(&row.high),
                        quotes::low.eq(&row.low),
                        quotes::close.eq(&row.close),
                        quotes::volume.eq(&row.volume),
                        quotes::previous_close.eq(&row.previous_close),
                        quotes::change.eq(&row.change),
                        quotes::change_percent.eq(&row.change_percent),
                        quotes::fetched_at.eq(&row.fetched_at),
                        quotes::expires_at.eq(&row.expires_at),
                        quotes::updated_at.eq(&updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    fn get_history(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Option<CachedEntity<Vec<HistoricalPrice>>>> {
        let mut conn = get_connection(&self.pool)?;
        let (from_text, to_text) = (date_to_db(from), date_to_db(to));

        let range = history_ranges::table
            .find((full_symbol, &from_text, &to_text))
            .select(HistoryRangeDB::as_select())
            .first::<HistoryRangeDB>(&mut conn)
            .optional()
            .into_core()?;
        let Some(range) = range else {
            return Ok(None);
        };
        let stamp = stamp_from_db(&range.fetched_at, &range.expires_at)
            .into_core()?;

        let bars = price_history::table
            .filter(price_history::full_symbol.eq(full_symbol))
            .filter(price_history::date.ge(&from_text))
            .filter(price_history::date.le(&to_text))
            .order(price_history::date.asc())
            .select(PriceBarDB::as_select())
            .load::<PriceBarDB>(&mut conn)
            .into_core()?
            .into_iter()
            .map(HistoricalPrice::try_from)
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .into_core()?;

        Ok(Some(CachedEntity::new(bars, stamp)))
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
        let times = touch::on_insert(fetched_at);
        let updated_at = touch::on_update(fetched_at);
        let stamp = CacheStamp::new(fetched_at, ttl);
        let rows: Vec<PriceBarDB> = bars
            .iter()
            .map(|bar| PriceBarDB::new(full_symbol, bar, &times))
            .collect();
        let range = HistoryRangeDB {
            full_symbol: full_symbol.to_string(),
            from_date: date_to_db(from),
            to_date: date_to_db(to),
            fetched_at: time_to_db(stamp.fetched_at),
            expires_at: time_to_db(stamp.expires_at),
            created_at: times.created_at.clone(),
            updated_at: times.updated_at.clone(),
        };

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                // Bars of the range are replaced as a whole.
                diesel::delete(
                    price_history::table
                        .filter(price_history::full_symbol.eq(&range.full_symbol))
                        .filter(price_history::date.ge(&range.from_date))
                        .filter(price_history::date.le(&range.to_date)),
                )
                .execute(conn)
                .into_core()?;

                let mut written = 0;
                for chunk in chunk_for_sqlite(&rows) {
                    written += diesel::replace_into(price_history::table)
                        .values(chunk)
                        .execute(conn)
                        .into_core()?;
                }

                diesel::insert_into(history_ranges::table)
                    .values(&range)
                    .on_conflict((
                        history_ranges::full_symbol,
                        history_ranges::from_date,
                        history_ranges::to_date,
                    ))
                    .do_update()
                    .set((
                        history_ranges::fetched_at.eq(&range.fetched_at),
                        history_ranges::expires_at.eq(&range.expires_at),
                        history_ranges::updated_at.eq(&updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(written)
            })
            .await
    }

    // =========================================================================
    // Fundamentals
    // =========================================================================

    fn get_fundamentals(&self, full_symbol: &str) -> Result<Option<CachedEntity<Fundamentals>>> {
        let mut conn = get_connection(&self.pool)?;
        let row = fundamentals::table
            .find(full_symbol)
            .select(FundamentalsDB::as_select())
            .first::<FundamentalsDB>(&mut conn)
            .optional()
            .into_core()?;

        match row {
            Some(row) => {
                let (document, stamp) = row.into_domain().into_core()?;
                Ok(Some(CachedEntity::new(document, stamp)))
            }
            None => Ok(None),
        }
    }

    fn fundamentals_symbols(&self, exchange_code: &str) -> Result<HashSet<String>> {
        let mut conn = get_connection(&self.pool)?;
        let tickers = fundamentals::table
            .filter(fundamentals::exchange_code.eq(exchange_code))
            .select(fundamentals::ticker)
            .load::<String>(&mut conn)
            .into_core()?;
        Ok(tickers.into_iter().collect())
    }

    async fn upsert_fundamentals(
        &self,
        document: &Fundamentals,
        fetched_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<()> {
        let (ticker, exchange_code) = split_full_symbol(&document.full_symbol).ok_or_else(|| {
            Error::Validation(format!(
                "'{}' is not a TICKER.EXCHANGE symbol",
                document.full_symbol
            ))
        })?;
        let row = FundamentalsDB::new(
            ticker,
            exchange_code,
            document,
            &CacheStamp::new(fetched_at, ttl),
            &touch::on_insert(fetched_at),
        )
        .into_core()?;
        let updated_at = touch::on_update(fetched_at);

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(fundamentals::table)
                    .values(&row)
                    .on_conflict(fundamentals::full_symbol)
                    .do_update()
                    .set((
                        fundamentals::name.eq(&row.name),
                        fundamentals::sector.eq(&row.sector),
                        fundamentals::industry.eq(&row.industry),
                        fundamentals::data.eq(&row.data),
                        fundamentals::fetched_at.eq(&row.fetched_at),
                        fundamentals::expires_at.eq(&row.expires_at),
                        fundamentals::updated_at.eq(&updated_at),
                    ))
                    .execute(conn)
                    .into_core()?;
                Ok(())
            })
            .await
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    async fn delete_all(&self, scope: CacheScope) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let removed = match &scope {
                    CacheScope::Exchanges => {
                        diesel::delete(cache_stamps::table.find(EXCHANGES_KEY))
                            .execute(conn)
                            .into_core()?;
                        diesel::delete(exchanges::table).execute(conn).into_core()?
                    }
                    CacheScope::Symbols(code) => {
                        diesel::delete(cache_stamps::table.find(symbols_key(code)))
                            .execute(conn)
                            .into_core()?;
                        diesel::delete(symbols::table.filter(symbols::exchange_code.eq(code)))
                            .execute(conn)
                            .into_core()?
                    }
                    CacheScope::Quotes => diesel::delete(quotes::table).execute(conn).into_core()?,
                    CacheScope::History => {
                        diesel::delete(history_ranges::table)
                            .execute(conn)
                            .into_core()?;
                        diesel::delete(price_history::table).execute(conn).into_core()?
                    }
                    CacheScope::Fundamentals => {
                        diesel::delete(fundamentals::table).execute(conn).into_core()?
                    }
                };
                log::debug!("Removed {} cached rows ({:?})", removed, scope);
                Ok(removed)
            })
            .await
    }
}
