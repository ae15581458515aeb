//! Market data provider access for marketcache.
//!
//! This crate owns everything that touches the external market data provider:
//! - Domain models for exchanges, symbols, quotes, bars and fundamentals
//! - The `MarketDataProvider` trait and its HTTP implementation
//! - Classification of provider failures (throttling vs. exhausted daily quota)
//! - The shared rate governor, circuit breaker and retry policy
//!
//! # Architecture
//!
//! ```text
//! +----------------------+      +----------------------+
//! |  Read-through cache  |      |  Backfill orchestr.  |
//! +----------------------+      +----------------------+
//!            \                            /
//!             v                          v
//!           +------------------------------+
//!           |        ProviderClient        |  circuit breaker, retry, timeout
//!           +------------------------------+
//!                          |
//!                          v
//!           +------------------------------+
//!           |   RateGovernor (shared Arc)  |  one permit pool per process
//!           +------------------------------+
//!                          |
//!                          v
//!           +------------------------------+
//!           |  MarketDataProvider (EODHD)  |  HTTP + classification
//!           +------------------------------+
//! ```

pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;

pub use errors::{ProviderError, ProviderErrorKind, RetryClass};
pub use models::{split_full_symbol, Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};
pub use provider::eodhd::EodhdProvider;
pub use provider::MarketDataProvider;
pub use registry::{
    CircuitBreaker, CircuitBreakerConfig, CircuitState, ProviderClient, ProviderClientConfig,
    RateGovernor, RateGovernorConfig, RetryPolicy,
};
