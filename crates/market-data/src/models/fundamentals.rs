use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fundamentals document for a symbol.
///
/// The provider document is large and loosely typed, so it is kept as raw JSON.
/// The few fields needed for listing and filtering are lifted out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fundamentals {
    pub full_symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub data: Value,
}

impl Fundamentals {
    /// Build from a raw provider document, lifting `General.{Name,Sector,Industry}`.
    pub fn from_document(full_symbol: impl Into<String>, data: Value) -> Self {
        let general = data.get("General");
        let text = |field: &str| {
            general
                .and_then(|g| g.get(field))
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Self {
            full_symbol: full_symbol.into(),
            name: text("Name"),
            sector: text("Sector"),
            industry: text("Industry"),
            data,
        }
    }

    /// Whether the document carries no data at all (`{}`, `[]` or `null`).
    pub fn is_empty_document(data: &Value) -> bool {
        match data {
            Value::Null => true,
            Value::Object(map) => map.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }
}
