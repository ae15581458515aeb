//! Failures raised inside the SQLite adapter.
//!
//! Repositories work with [`StorageError`] and hand callers a core [`Error`]
//! through [`IntoCore`], so Diesel and r2d2 types never leave this crate.

use diesel::result::Error as DieselError;
use marketcache_core::errors::{DatabaseError, Error};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot open SQLite database: {0}")]
    ConnectionFailed(#[from] diesel::ConnectionError),

    #[error("No pooled connection available: {0}")]
    PoolError(#[from] r2d2::Error),

    #[error("SQLite statement failed: {0}")]
    QueryFailed(#[from] DieselError),

    /// An embedded migration could not be applied.
    #[error("Schema migration failed: {0}")]
    MigrationFailed(String),

    /// A stored column could not be decoded (timestamp, decimal or JSON text).
    #[error("Cannot decode stored value: {0}")]
    SerializationError(String),

    /// A core error raised inside a writer job.
    #[error("{0}")]
    CoreError(String),
}

impl From<Error> for StorageError {
    fn from(err: Error) -> Self {
        StorageError::CoreError(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::SerializationError(err.to_string())
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConnectionFailed(e) => {
                Error::Database(DatabaseError::ConnectionFailed(e.to_string()))
            }
            StorageError::PoolError(e) => {
                Error::Database(DatabaseError::PoolCreationFailed(e.to_string()))
            }
            StorageError::QueryFailed(DieselError::NotFound) => {
                Error::Database(DatabaseError::NotFound("Record not found".to_string()))
            }
            StorageError::QueryFailed(DieselError::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            )) => Error::Database(DatabaseError::UniqueViolation(info.message().to_string())),
            StorageError::QueryFailed(e) => {
                Error::Database(DatabaseError::QueryFailed(e.to_string()))
            }
            StorageError::MigrationFailed(e) => Error::Database(DatabaseError::MigrationFailed(e)),
            StorageError::SerializationError(e) => Error::Database(DatabaseError::Internal(e)),
            StorageError::CoreError(e) => Error::Database(DatabaseError::TransactionFailed(e)),
        }
    }
}

/// `.into_core()` on Diesel, r2d2 and storage results.
pub trait IntoCore<T> {
    fn into_core(self) -> marketcache_core::Result<T>;
}

impl<T> IntoCore<T> for std::result::Result<T, DieselError> {
    fn into_core(self) -> marketcache_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, r2d2::Error> {
    fn into_core(self) -> marketcache_core::Result<T> {
        self.map_err(|e| StorageError::from(e).into())
    }
}

impl<T> IntoCore<T> for std::result::Result<T, StorageError> {
    fn into_core(self) -> marketcache_core::Result<T> {
        self.map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_database_not_found() {
        let err: Error = StorageError::QueryFailed(DieselError::NotFound).into();
        assert!(matches!(err, Error::Database(DatabaseError::NotFound(_))));
    }

    #[test]
    fn test_migration_failure_keeps_its_message() {
        let err: Error = Err::<(), _>(StorageError::MigrationFailed("no such table".into()))
            .into_core()
            .unwrap_err();
        assert!(
            matches!(err, Error::Database(DatabaseError::MigrationFailed(ref m)) if m == "no such table")
        );
    }

    #[test]
    fn test_decode_failure_maps_to_internal() {
        let err: Error = StorageError::SerializationError("bad decimal".into()).into();
        assert!(matches!(err, Error::Database(DatabaseError::Internal(ref m)) if m == "bad decimal"));
    }
}
