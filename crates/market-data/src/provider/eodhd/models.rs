//! EODHD API response models.
//!
//! The API mixes numbers, numeric strings and the literal "NA" for missing values,
//! so numeric fields go through [`lenient_decimal`].

use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Item of `/exchanges-list`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExchangeResponse {
    pub name: String,
    pub code: String,
    #[serde(rename = "OperatingMIC")]
    pub operating_mic: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "CountryISO2")]
    pub country_iso2: Option<String>,
    #[serde(rename = "CountryISO3")]
    pub country_iso3: Option<String>,
}

/// Item of `/exchange-symbol-list/{code}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SymbolResponse {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
    #[serde(rename = "Type")]
    pub symbol_type: Option<String>,
    pub isin: Option<String>,
    // Note: Country also exists but the exchange already carries it
}

/// Response of `/real-time/{symbol}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealTimeResponse {
    #[serde(default, deserialize_with = "lenient_i64")]
    pub timestamp: Option<i64>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub open: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub high: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub low: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub close: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub previous_close: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub change: Option<Decimal>,
    #[serde(default, rename = "change_p", deserialize_with = "lenient_decimal")]
    pub change_percent: Option<Decimal>,
}

/// Item of `/eod/{symbol}`.
#[derive(Debug, Deserialize)]
pub struct EodBarResponse {
    pub date: String,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub open: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub high: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub low: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub close: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub adjusted_close: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub volume: Option<Decimal>,
}

fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| n.as_f64().and_then(Decimal::from_f64)),
        Value::String(s) => Decimal::from_str(s.trim())
            .ok()
            .or_else(|| Decimal::from_scientific(s.trim()).ok()),
        _ => None,
    }
}

/// Accepts a number, a numeric string, "NA" or null.
pub fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_decimal))
}

/// Accepts an integer, a numeric string, "NA" or null.
pub fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}
