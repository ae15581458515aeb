//! Market data models
//!
//! Provider-agnostic domain types cached by the system:
//! - `exchange` - Exchange listing (Exchange)
//! - `symbol` - Tradable symbol of an exchange (Symbol)
//! - `quote` - Latest quote and end-of-day bars (Quote, HistoricalPrice)
//! - `fundamentals` - Fundamentals document (Fundamentals)

mod exchange;
mod fundamentals;
mod quote;
mod symbol;

pub use exchange::Exchange;
pub use fundamentals::Fundamentals;
pub use quote::{HistoricalPrice, Quote};
pub use symbol::{split_full_symbol, Symbol};
