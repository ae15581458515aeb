use serde::{Deserialize, Serialize};

/// A tradable symbol listed under a provider exchange code.
///
/// `ticker` + `exchange_code` form the globally unique [`full_symbol`](Self::full_symbol),
/// e.g. `AAPL.US` or `VOD.LSE`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub ticker: String,
    /// Exchange code the symbol is listed under at the provider.
    pub exchange_code: String,
    /// Venue reported by the provider (e.g. "NASDAQ" for a `US` listing).
    pub parent_exchange: String,
    pub name: String,
    #[serde(rename = "type")]
    pub symbol_type: Option<String>,
    pub isin: Option<String>,
    pub currency: Option<String>,
    pub is_active: bool,
}

impl Symbol {
    /// Ticker and exchange code joined with a dot.
    pub fn full_symbol(&self) -> String {
        format!("{}.{}", self.ticker, self.exchange_code)
    }
}

/// Split a `TICKER.EXCHANGE` string at its last dot.
///
/// Returns `None` when either side is empty or there is no dot. Tickers may themselves
/// contain dots (`BRK.B.US`), so the split happens at the last one.
pub fn split_full_symbol(full_symbol: &str) -> Option<(&str, &str)> {
    let (ticker, exchange) = full_symbol.trim().rsplit_once('.')?;
    if ticker.is_empty() || exchange.is_empty() {
        return None;
    }
    Some((ticker, exchange))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_symbol() {
        let symbol = Symbol {
            ticker: "VOD".to_string(),
            exchange_code: "LSE".to_string(),
            parent_exchange: "LSE".to_string(),
            name: "Vodafone Group PLC".to_string(),
            symbol_type: Some("Common Stock".to_string()),
            isin: Some("GB00BH4HKS39".to_string()),
            currency: Some("GBX".to_string()),
            is_active: true,
        };
        assert_eq!(symbol.full_symbol(), "VOD.LSE");
    }

    #[test]
    fn test_split_full_symbol() {
        assert_eq!(split_full_symbol("AAPL.US"), Some(("AAPL", "US")));
        assert_eq!(split_full_symbol("BRK.B.US"), Some(("BRK.B", "US")));
        assert_eq!(split_full_symbol("AAPL"), None);
        assert_eq!(split_full_symbol(".US"), None);
        assert_eq!(split_full_symbol("AAPL."), None);
    }
}
