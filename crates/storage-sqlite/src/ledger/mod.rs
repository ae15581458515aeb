//! Persistent skip-list of listings without fundamentals.

mod model;
mod repository;

pub use model::UnavailableSymbolDB;
pub use repository::UnavailabilityRepository;
