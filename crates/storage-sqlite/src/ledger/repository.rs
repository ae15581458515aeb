use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;
use marketcache_core::clock::Clock;
use marketcache_core::errors::Result;
use marketcache_core::ledger::{SymbolKey, UnavailabilityLedger, UnavailabilityRecord};

use super::model::UnavailableSymbolDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::unavailable_symbols::{self, dsl};
use crate::touch;
use crate::utils::time_to_db;

/// SQLite implementation of [`UnavailabilityLedger`].
pub struct UnavailabilityRepository {
    pool: Arc<DbPool>,
    writer: WriteHandle,
    clock: Arc<dyn Clock>,
}

impl UnavailabilityRepository {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            writer,
            clock,
        }
    }

    fn into_records(rows: Vec<UnavailableSymbolDB>) -> Result<Vec<UnavailabilityRecord>> {
        rows.into_iter()
            .map(UnavailabilityRecord::try_from)
            .collect::<std::result::Result<Vec<_>, StorageError>>()
            .into_core()
    }
}

#[async_trait]
impl UnavailabilityLedger for UnavailabilityRepository {
    async fn mark_failed(&self, key: &SymbolKey, message: &str) -> Result<UnavailabilityRecord> {
        let now = self.clock.now();
        let attempted_at = time_to_db(now);
        let times = touch::on_insert(now);
        let updated_at = touch::on_update(now);
        let row = UnavailableSymbolDB {
            ticker: key.ticker.clone(),
            exchange_code: key.exchange_code.clone(),
            failure_count: 1,
            first_failed_at: attempted_at.clone(),
            last_attempted_at: attempted_at,
            last_error_message: Some(message.to_string()),
            created_at: times.created_at,
            updated_at: times.updated_at,
        };

        self.writer
            .exec(
                move |conn: &mut SqliteConnection| -> Result<UnavailabilityRecord> {
                    diesel::insert_into(unavailable_symbols::table)
                        .values(&row)
                        .on_conflict((dsl::ticker, dsl::exchange_code))
                        .do_update()
                        .set((
                            dsl::failure_count.eq(dsl::failure_count + 1),
                            dsl::last_attempted_at.eq(&row.last_attempted_at),
                            dsl::last_error_message.eq(&row.last_error_message),
                            dsl::updated_at.eq(&updated_at),
                        ))
                        .execute(conn)
                        .into_core()?;

                    let stored = unavailable_symbols::table
                        .find((&row.ticker, &row.exchange_code))
                        .select(UnavailableSymbolDB::as_select())
                        .first::<UnavailableSymbolDB>(conn)
                        .into_core()?;
                    UnavailabilityRecord::try_from(stored).into_core()
                },
            )
            .await
    }

    fn is_marked(&self, key: &SymbolKey) -> Result<bool> {
        let mut conn = get_connection(&self.pool)?;
        let count: i64 = unavailable_symbols::table
            .filter(dsl::ticker.eq(&key.ticker))
            .filter(dsl::exchange_code.eq(&key.exchange_code))
            .select(count_star())
            .first(&mut conn)
            .into_core()?;
        Ok(count > 0)
    }

    async fn clear(&self, key: &SymbolKey) -> Result<bool> {
        let (ticker, exchange_code) = (key.ticker.clone(), key.exchange_code.clone());
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let removed = diesel::delete(unavailable_symbols::table.find((&ticker, &exchange_code)))
                    .execute(conn)
                    .into_core()?;
                Ok(removed > 0)
            })
            .await
    }

    fn list_for_exchange(&self, exchange_code: &str) -> Result<Vec<UnavailabilityRecord>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = unavailable_symbols::table
            .filter(dsl::exchange_code.eq(exchange_code))
            .order(dsl::ticker.asc())
            .select(UnavailableSymbolDB::as_select())
            .load::<UnavailableSymbolDB>(&mut conn)
            .into_core()?;
        Self::into_records(rows)
    }

    fn marked_tickers(&self, exchange_code: &str) -> Result<HashSet<String>> {
        let mut conn = get_connection(&self.pool)?;
        let tickers = unavailable_symbols::table
            .filter(dsl::exchange_code.eq(exchange_code))
            .select(dsl::ticker)
            .load::<String>(&mut conn)
            .into_core()?;
        Ok(tickers.into_iter().collect())
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let cutoff = time_to_db(cutoff);
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let removed =
                    diesel::delete(unavailable_symbols::table.filter(dsl::last_attempted_at.lt(&cutoff)))
                        .execute(conn)
                        .into_core()?;
                debug!("Purged {} ledger records last attempted before {}", removed, cutoff);
                Ok(removed)
            })
            .await
    }
}
