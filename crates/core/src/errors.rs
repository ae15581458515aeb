//! Core error types for marketcache.
//!
//! This module defines database-agnostic error types. Storage-specific errors
//! (from Diesel, SQLite, etc.) are converted to these types by the storage layer,
//! provider failures arrive as [`ProviderError`] and keep their classification.

use std::time::Duration;

use marketcache_market_data::{ProviderError, ProviderErrorKind};
use thiserror::Error;

/// Type alias for Result using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Root error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input, e.g. a ticker without exchange suffix.
    #[error("Input validation failed: {0}")]
    Validation(String),

    /// Unknown exchange or symbol.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The operation clashes with one already in progress.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Market data provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Database operation failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Invalid configuration value: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Internal(String),
}

/// Database-agnostic error type for storage operations.
///
/// This enum uses `String` for all error details, allowing the storage layer
/// to convert storage-specific errors (Diesel, SQLite, etc.) into this format.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to establish a database connection.
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to create or configure the connection pool.
    #[error("Failed to create database pool: {0}")]
    PoolCreationFailed(String),

    /// A database query failed to execute.
    #[error("Database query failed: {0}")]
    QueryFailed(String),

    /// The requested record was not found.
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A unique constraint was violated (e.g., duplicate key).
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// A database transaction failed.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Database migration failed.
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Internal/unexpected database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Caller-facing error taxonomy.
///
/// Provider failures keep their classification so the API layer can tell
/// "retry later" from "come back tomorrow".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    /// Transient throttling, retry after [`Error::retry_after`].
    ProviderRateLimit,
    /// Daily quota exhausted.
    ProviderDailyLimit,
    /// Network, timeout, 5xx, malformed body or open circuit.
    ProviderUnavailable,
    Cancelled,
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Provider(err) => match err.kind() {
                ProviderErrorKind::RateLimit => ErrorKind::ProviderRateLimit,
                ProviderErrorKind::DailyLimit => ErrorKind::ProviderDailyLimit,
                ProviderErrorKind::Unavailable => ErrorKind::ProviderUnavailable,
                ProviderErrorKind::NotFound => ErrorKind::NotFound,
                ProviderErrorKind::Cancelled => ErrorKind::Cancelled,
            },
            Error::Database(DatabaseError::NotFound(_)) => ErrorKind::NotFound,
            Error::Database(_) | Error::Config(_) | Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Suggested delay for throttled provider calls.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Error::Provider(ProviderError::RateLimited { retry_after }) => Some(*retry_after),
            _ => None,
        }
    }
}
