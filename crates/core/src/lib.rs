//! marketcache Core - cache model, storage contracts and the refresh engines.
//!
//! This crate contains the business logic of marketcache: the read-through cache
//! used by interactive reads and the bulk backfill orchestrator. It is
//! database-agnostic and defines traits that are implemented by the
//! `storage-sqlite` crate.

pub mod backfill;
pub mod cache;
pub mod clock;
pub mod constants;
pub mod errors;
pub mod ledger;
pub mod settings;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
