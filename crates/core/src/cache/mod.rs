//! Cached market data.
//!
//! - [`model`] - Cache stamps, cached entities, responses and pagination
//! - [`store`] - Storage gateway trait implemented by the storage crate
//! - [`service`] - Read-through gate used by the API layer
//! - [`single_flight`] - Per-key refresh locks
//!
//! # Architecture
//!
//! ```text
//! API ──► MarketDataCache ──► MarketCacheStore (hit)
//!                │
//!                └──► ProviderClient ──► MarketCacheStore (miss)
//! ```

pub mod model;
pub mod service;
pub mod single_flight;
pub mod store;


pub use model::{
    CacheScope, CacheSource, CacheStamp, CachedEntity, CachedResponse, Page, PageParams,
    SortOrder,
};
pub use service::MarketDataCache;
pub use store::MarketCacheStore;
