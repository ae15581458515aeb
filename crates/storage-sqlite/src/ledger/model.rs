//! Database model for the unavailability ledger.

use diesel::prelude::*;
use marketcache_core::ledger::UnavailabilityRecord;

use crate::errors::StorageError;
use crate::utils::time_from_db;

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::unavailable_symbols)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UnavailableSymbolDB {
    pub ticker: String,
    pub exchange_code: String,
    pub failure_count: i64,
    pub first_failed_at: String,
    pub last_attempted_at: String,
    pub last_error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<UnavailableSymbolDB> for UnavailabilityRecord {
    type Error = StorageError;

    fn try_from(db: UnavailableSymbolDB) -> Result<Self, Self::Error> {
        Ok(Self {
            ticker: db.ticker,
            exchange_code: db.exchange_code,
            failure_count: db.failure_count,
            first_failed_at: time_from_db(&db.first_failed_at)?,
            last_attempted_at: time_from_db(&db.last_attempted_at)?,
            last_error_message: db.last_error_message,
        })
    }
}
