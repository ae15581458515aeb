//! EODHD market data provider implementation.
//!
//! Endpoints used:
//! - `/exchanges-list` - supported exchanges
//! - `/exchange-symbol-list/{code}` - symbols of one exchange
//! - `/real-time/{symbol}` - latest (delayed) quote
//! - `/eod/{symbol}` - daily bars
//! - `/fundamentals/{symbol}` - fundamentals document
//!
//! The API token travels as the `api_token` query parameter. HTTP 429 is returned both
//! for short-window throttling and for an exhausted daily quota; the two are told apart
//! by the response body.

mod models;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::debug;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use self::models::{EodBarResponse, ExchangeResponse, RealTimeResponse, SymbolResponse};
use crate::errors::ProviderError;
use crate::models::{Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};
use crate::provider::MarketDataProvider;

pub const DEFAULT_BASE_URL: &str = "https://eodhd.com/api";
const PROVIDER_ID: &str = "EODHD";

/// Retry delay suggested when a 429 carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Body fragments that mark a 429 as an exhausted daily quota.
const DAILY_LIMIT_MARKERS: &[&str] = &["daily", "quota", "limit exceeded", "per day"];

/// Error bodies are truncated to this many characters in error messages.
const MAX_ERROR_BODY_CHARS: usize = 256;

/// EODHD JSON API provider.
pub struct EodhdProvider {
    client: Client,
    base_url: String,
    api_token: String,
}

impl EodhdProvider {
    /// Create a provider for `base_url` authenticating with `api_token`.
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
        }
    }

    /// GET `path` and decode the JSON body, classifying any failure.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("EODHD request: /{} with {} params", path, params.len());

        let response = self
            .client
            .get(&url)
            .query(&[("api_token", self.api_token.as_str()), ("fmt", "json")])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, retry_after, &body, path));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| ProviderError::InvalidResponse(format!("/{}: {}", path, e)))
    }
}

/// Map a non-success response to a [`ProviderError`].
///
/// - 429 with a quota marker in the body -> `DailyLimitExceeded`
/// - 429 otherwise -> `RateLimited` with `retry_after` or [`DEFAULT_RETRY_AFTER`]
/// - 404 -> `NotFound`
/// - anything else -> `Server`
pub fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
    resource: &str,
) -> ProviderError {
    match status {
        StatusCode::TOO_MANY_REQUESTS if is_daily_limit_body(body) => {
            ProviderError::DailyLimitExceeded {
                message: truncate(body),
            }
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
        },
        StatusCode::NOT_FOUND => ProviderError::NotFound(resource.to_string()),
        _ => ProviderError::Server {
            status: status.as_u16(),
            message: truncate(body),
        },
    }
}

/// Whether a 429 body reports the daily quota as exhausted.
pub fn is_daily_limit_body(body: &str) -> bool {
    let body = body.to_ascii_lowercase();
    DAILY_LIMIT_MARKERS.iter().any(|marker| body.contains(marker))
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        body.to_string()
    } else {
        let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        cut.push_str("...");
        cut
    }
}

fn into_exchanges(items: Vec<ExchangeResponse>) -> Vec<Exchange> {
    items
        .into_iter()
        .filter(|item| !item.code.trim().is_empty())
        .map(|item| Exchange {
            code: item.code.trim().to_string(),
            name: item.name,
            operating_mic: item.operating_mic.filter(|s| !s.is_empty()),
            country: item.country.filter(|s| !s.is_empty()),
            currency: item.currency.filter(|s| !s.is_empty()),
            country_iso2: item.country_iso2.filter(|s| !s.is_empty()),
            country_iso3: item.country_iso3.filter(|s| !s.is_empty()),
        })
        .collect()
}

/// Convert a symbol listing, dropping blank and duplicate tickers (first one wins).
fn into_symbols(exchange_code: &str, items: Vec<SymbolResponse>) -> Vec<Symbol> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter_map(|item| {
            let ticker = item.code.trim().to_string();
            if ticker.is_empty() || !seen.insert(ticker.clone()) {
                return None;
            }
            Some(Symbol {
                name: item.name.unwrap_or_else(|| ticker.clone()),
                ticker,
                exchange_code: exchange_code.to_string(),
                parent_exchange: item
                    .exchange
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| exchange_code.to_string()),
                symbol_type: item.symbol_type.filter(|s| !s.is_empty()),
                isin: item.isin.filter(|s| !s.is_empty()),
                currency: item.currency.filter(|s| !s.is_empty()),
                is_active: true,
            })
        })
        .collect()
}

fn into_quote(full_symbol: &str, item: RealTimeResponse) -> Result<Quote, ProviderError> {
    let timestamp = item
        .timestamp
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
        .ok_or_else(|| ProviderError::NotFound(full_symbol.to_string()))?;

    Ok(Quote {
        full_symbol: full_symbol.to_string(),
        timestamp,
        open: item.open,
        high: item.high,
        low: item.low,
        close: item.close,
        volume: item.volume,
        previous_close: item.previous_close,
        change: item.change,
        change_percent: item.change_percent,
    })
}

/// Convert daily bars, skipping rows with an unparsable date or missing prices.
fn into_bars(items: Vec<EodBarResponse>) -> Vec<HistoricalPrice> {
    let mut bars: Vec<HistoricalPrice> = items
        .into_iter()
        .filter_map(|item| {
            let date = NaiveDate::parse_from_str(&item.date, "%Y-%m-%d").ok()?;
            let close = item.close?;
            Some(HistoricalPrice {
                date,
                open: item.open?,
                high: item.high?,
                low: item.low?,
                close,
                adjusted_close: item.adjusted_close.unwrap_or(close),
                volume: item.volume.unwrap_or_default(),
            })
        })
        .collect();
    bars.sort_by_key(|bar| bar.date);
    bars
}

#[async_trait]
impl MarketDataProvider for EodhdProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn list_exchanges(&self) -> Result<Vec<Exchange>, ProviderError> {
        let items: Vec<ExchangeResponse> = self.fetch("exchanges-list/", &[]).await?;
        Ok(into_exchanges(items))
    }

    async fn list_symbols(&self, exchange_code: &str) -> Result<Vec<Symbol>, ProviderError> {
        let path = format!(
            "exchange-symbol-list/{}",
            urlencoding::encode(exchange_code)
        );
        let items: Vec<SymbolResponse> = self.fetch(&path, &[]).await?;
        Ok(into_symbols(exchange_code, items))
    }

    async fn get_quote(&self, full_symbol: &str) -> Result<Quote, ProviderError> {
        let path = format!("real-time/{}", urlencoding::encode(full_symbol));
        let item: RealTimeResponse = self.fetch(&path, &[]).await?;
        into_quote(full_symbol, item)
    }

    async fn get_historical_prices(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<HistoricalPrice>, ProviderError> {
        let path = format!("eod/{}", urlencoding::encode(full_symbol));
        let params = [
            ("from", from.format("%Y-%m-%d").to_string()),
            ("to", to.format("%Y-%m-%d").to_string()),
            ("period", "d".to_string()),
        ];
        let items: Vec<EodBarResponse> = self.fetch(&path, &params).await?;
        Ok(into_bars(items))
    }

    async fn get_fundamentals(&self, full_symbol: &str) -> Result<Fundamentals, ProviderError> {
        let path = format!("fundamentals/{}", urlencoding::encode(full_symbol));
        let document: Value = self.fetch(&path, &[]).await?;
        if Fundamentals::is_empty_document(&document) {
            return Err(ProviderError::NotFound(full_symbol.to_string()));
        }
        Ok(Fundamentals::from_document(full_symbol, document))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_429_with_daily_marker_is_daily_limit() {
        let error = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            "Daily limit exceeded",
            "fundamentals/AAPL.US",
        );
        assert!(matches!(error, ProviderError::DailyLimitExceeded { .. }));

        let error = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(5)),
            r#"{"message":"You exceeded your API QUOTA"}"#,
            "eod/AAPL.US",
        );
        assert!(matches!(error, ProviderError::DailyLimitExceeded { .. }));
    }

    #[test]
    fn test_429_without_marker_is_rate_limit() {
        let error = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(12)),
            "Too Many Requests",
            "real-time/AAPL.US",
        );
        assert_eq!(
            error,
            ProviderError::RateLimited {
                retry_after: Duration::from_secs(12)
            }
        );
    }

    #[test]
    fn test_429_defaults_retry_after() {
        let error = classify_failure(StatusCode::TOO_MANY_REQUESTS, None, "", "eod/AAPL.US");
        assert_eq!(
            error,
            ProviderError::RateLimited {
                retry_after: DEFAULT_RETRY_AFTER
            }
        );
    }

    #[test]
    fn test_other_statuses() {
        assert_eq!(
            classify_failure(StatusCode::NOT_FOUND, None, "Ticker Not Found.", "eod/X.US"),
            ProviderError::NotFound("eod/X.US".to_string())
        );
        assert_eq!(
            classify_failure(StatusCode::BAD_GATEWAY, None, " Bad Gateway ", "eod/X.US"),
            ProviderError::Server {
                status: 502,
                message: "Bad Gateway".to_string()
            }
        );
    }

    #[test]
    fn test_parse_retry_after() {
        assert_eq!(parse_retry_after("30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn test_long_bodies_are_truncated() {
        let body = "x".repeat(1000);
        let ProviderError::Server { message, .. } =
            classify_failure(StatusCode::INTERNAL_SERVER_ERROR, None, &body, "eod/X.US")
        else {
            panic!("expected server error");
        };
        assert_eq!(message.len(), MAX_ERROR_BODY_CHARS + 3);
    }

    #[test]
    fn test_into_symbols_dedupes_and_defaults() {
        let items: Vec<SymbolResponse> = serde_json::from_str(
            r#"[
                {"Code":"AAPL","Name":"Apple Inc","Exchange":"NASDAQ","Currency":"USD","Type":"Common Stock","Isin":"US0378331005"},
                {"Code":"AAPL","Name":"Apple duplicate","Exchange":"NASDAQ","Currency":"USD","Type":"Common Stock","Isin":null},
                {"Code":"  ","Name":"Blank","Exchange":"NYSE","Currency":"USD","Type":"Common Stock","Isin":null},
                {"Code":"SPY","Name":null,"Exchange":"","Currency":"USD","Type":"ETF","Isin":""}
            ]"#,
        )
        .unwrap();

        let symbols = into_symbols("US", items);
        assert_eq!(symbols.len(), 2);
        assert_eq!(symbols[0].full_symbol(), "AAPL.US");
        assert_eq!(symbols[0].parent_exchange, "NASDAQ");
        assert_eq!(symbols[0].name, "Apple Inc");
        assert_eq!(symbols[1].name, "SPY");
        assert_eq!(symbols[1].parent_exchange, "US");
        assert_eq!(symbols[1].isin, None);
    }

    #[test]
    fn test_into_quote_requires_timestamp() {
        let item: RealTimeResponse =
            serde_json::from_str(r#"{"timestamp":"NA","close":"NA"}"#).unwrap();
        assert_eq!(
            into_quote("NOPE.US", item),
            Err(ProviderError::NotFound("NOPE.US".to_string()))
        );

        let item: RealTimeResponse =
            serde_json::from_str(r#"{"timestamp":1700000000,"close":189.5}"#).unwrap();
        let quote = into_quote("AAPL.US", item).unwrap();
        assert_eq!(quote.close, Some(dec!(189.5)));
        assert_eq!(quote.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_into_bars_sorts_and_skips_incomplete_rows() {
        let items: Vec<EodBarResponse> = serde_json::from_str(
            r#"[
                {"date":"2024-01-03","open":10,"high":11,"low":9,"close":10.5,"adjusted_close":10.4,"volume":1000},
                {"date":"2024-01-02","open":9,"high":10,"low":8,"close":9.5,"volume":800},
                {"date":"2024-01-04","open":"NA","high":11,"low":9,"close":10.5,"adjusted_close":10.4,"volume":1000}
            ]"#,
        )
        .unwrap();

        let bars = into_bars(items);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(bars[0].adjusted_close, dec!(9.5));
        assert_eq!(bars[1].volume, dec!(1000));
    }
}
