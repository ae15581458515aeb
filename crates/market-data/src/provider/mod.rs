//! Market data provider abstraction and implementation.
//!
//! This module contains:
//! - The `MarketDataProvider` trait: one raw HTTP round trip per call
//! - `EodhdProvider`: the JSON API implementation and its response classification
//!
//! Providers know nothing about rate limits, retries or circuit breaking; those are
//! applied by [`ProviderClient`](crate::registry::ProviderClient).

mod traits;

pub mod eodhd;

pub use traits::MarketDataProvider;
