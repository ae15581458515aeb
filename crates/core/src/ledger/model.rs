use std::fmt;

use chrono::{DateTime, Utc};
use marketcache_market_data::split_full_symbol;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// `(ticker, exchange_code)` identifying one listing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolKey {
    pub ticker: String,
    pub exchange_code: String,
}

impl SymbolKey {
    pub fn new(ticker: impl Into<String>, exchange_code: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            exchange_code: exchange_code.into(),
        }
    }

    /// Parse `TICKER.EXCHANGE`.
    pub fn parse(full_symbol: &str) -> Result<Self> {
        split_full_symbol(full_symbol)
            .map(|(ticker, exchange)| Self::new(ticker, exchange))
            .ok_or_else(|| {
                Error::Validation(format!(
                    "'{}' is not a TICKER.EXCHANGE symbol",
                    full_symbol.trim()
                ))
            })
    }

    pub fn full_symbol(&self) -> String {
        format!("{}.{}", self.ticker, self.exchange_code)
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.ticker, self.exchange_code)
    }
}

/// A listing known to yield no fundamentals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailabilityRecord {
    pub ticker: String,
    pub exchange_code: String,
    /// Incremented on every failed attempt.
    pub failure_count: i64,
    pub first_failed_at: DateTime<Utc>,
    pub last_attempted_at: DateTime<Utc>,
    pub last_error_message: Option<String>,
}

impl UnavailabilityRecord {
    pub fn key(&self) -> SymbolKey {
        SymbolKey::new(&self.ticker, &self.exchange_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_symbol() {
        let key = SymbolKey::parse("BRK.B.US").unwrap();
        assert_eq!(key.ticker, "BRK.B");
        assert_eq!(key.exchange_code, "US");
        assert_eq!(key.to_string(), "BRK.B.US");
    }

    #[test]
    fn test_parse_rejects_missing_suffix() {
        for input in ["AAPL", "AAPL.", ".US", ""] {
            let err = SymbolKey::parse(input).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{input}");
        }
    }
}
