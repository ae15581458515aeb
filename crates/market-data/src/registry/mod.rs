//! Provider call governance.
//!
//! This module wraps the raw provider with:
//! - A shared, injected rate governor (one permit pool per process)
//! - A circuit breaker for fault tolerance
//! - Bounded exponential backoff for transient failures
//! - A fixed per-call timeout

mod circuit_breaker;
mod client;
mod rate_governor;
mod retry_policy;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::{ProviderClient, ProviderClientConfig};
pub use rate_governor::{RateGovernor, RateGovernorConfig};
pub use retry_policy::RetryPolicy;
