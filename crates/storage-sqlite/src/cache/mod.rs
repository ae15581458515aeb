//! Cached exchanges, symbols, quotes, price history and fundamentals.

mod model;
mod repository;

pub use model::{
    CacheStampDB, ExchangeDB, FundamentalsDB, HistoryRangeDB, PriceBarDB, QuoteDB, SymbolDB,
};
pub use repository::MarketCacheRepository;
