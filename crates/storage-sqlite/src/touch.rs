//! Row bookkeeping columns.
//!
//! Every write to a cached table goes through one of these helpers so that
//! `created_at`, `updated_at` and `deleted_at` are maintained the same way
//! everywhere. Exchanges and symbols are soft-deleted: a row with `deleted_at` set
//! is invisible to reads and is revived by the next upsert of the same key.

use chrono::{DateTime, Utc};

use crate::utils::time_to_db;

/// Bookkeeping columns of a row being inserted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowTimes {
    pub created_at: String,
    pub updated_at: String,
}

/// Bookkeeping columns of a soft-deleted row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tombstone {
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

pub fn on_insert(at: DateTime<Utc>) -> RowTimes {
    let now = time_to_db(at);
    RowTimes {
        created_at: now.clone(),
        updated_at: now,
    }
}

/// `updated_at` for a row changed in place. `created_at` is never rewritten.
pub fn on_update(at: DateTime<Utc>) -> String {
    time_to_db(at)
}

pub fn on_delete(at: DateTime<Utc>) -> Tombstone {
    let now = time_to_db(at);
    Tombstone {
        updated_at: now.clone(),
        deleted_at: Some(now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_sets_both_columns() {
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let times = on_insert(at);
        assert_eq!(times.created_at, times.updated_at);
        assert_eq!(on_update(at), times.updated_at);
    }

    #[test]
    fn test_delete_sets_tombstone() {
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        let tombstone = on_delete(at);
        assert_eq!(tombstone.deleted_at.as_deref(), Some(tombstone.updated_at.as_str()));
    }
}
