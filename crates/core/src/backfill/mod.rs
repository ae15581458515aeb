//! Bulk backfill of missing fundamentals.
//!
//! - [`model`] - Run result, outcome and phases
//! - [`service`] - The orchestrator

pub mod model;
pub mod service;


pub use model::{BackfillPhase, BulkRunResult, RunOutcome};
pub use service::BackfillService;
