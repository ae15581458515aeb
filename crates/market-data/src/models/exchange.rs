use serde::{Deserialize, Serialize};

/// An exchange known to the provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    /// Provider exchange code (e.g. "US", "LSE", "XETRA").
    pub code: String,
    pub name: String,
    /// ISO 10383 operating MIC(s), comma separated when the code spans venues.
    pub operating_mic: Option<String>,
    pub country: Option<String>,
    pub currency: Option<String>,
    pub country_iso2: Option<String>,
    pub country_iso3: Option<String>,
}
