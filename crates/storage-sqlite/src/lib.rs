//! SQLite storage implementation for marketcache.
//!
//! This crate provides all database-related functionality using Diesel ORM with SQLite.
//! It implements the storage traits defined in `marketcache-core`:
//! - [`MarketCacheRepository`] for `MarketCacheStore`
//! - [`UnavailabilityRepository`] for `UnavailabilityLedger`
//!
//! # Architecture
//!
//! Reads run on pooled connections. Writes are serialised through a single writer
//! actor ([`WriteHandle`]), each job in its own immediate transaction.
//!
//! ```text
//!        core (domain)
//!              │
//!              ▼
//!     storage-sqlite (this crate)
//!              │
//!              ▼
//!          SQLite DB
//! ```

pub mod cache;
pub mod db;
pub mod errors;
pub mod ledger;
pub mod schema;
pub mod touch;
pub mod utils;

pub use cache::MarketCacheRepository;
pub use db::{
    create_pool, get_connection, init, open, run_migrations, spawn_writer, DbConnection, DbPool,
    WriteHandle,
};
pub use errors::{IntoCore, StorageError};
pub use ledger::UnavailabilityRepository;

pub use marketcache_core::errors::{DatabaseError, Error, Result};
