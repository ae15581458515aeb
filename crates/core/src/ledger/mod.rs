//! Unavailability ledger.
//!
//! Listings whose fundamentals fetch failed for a symbol-specific reason are recorded
//! here so bulk runs stop spending quota on them. A record lives until a fetch for
//! the same listing succeeds, or until it ages out when age-out is configured.

pub mod model;
pub mod store;

pub use model::{SymbolKey, UnavailabilityRecord};
pub use store::UnavailabilityLedger;
