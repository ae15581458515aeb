//! Error types and retry classification for provider calls.
//!
//! This module provides:
//! - [`ProviderError`]: every outcome of a provider call that is not a payload
//! - [`RetryClass`]: whether the provider client may retry the call
//! - [`ProviderErrorKind`]: the coarse taxonomy surfaced to callers

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the market data provider.
///
/// Each variant is classified into a [`RetryClass`] via [`retry_class`](Self::retry_class)
/// and into a [`ProviderErrorKind`] via [`kind`](Self::kind).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider throttled the request (HTTP 429 without quota markers).
    /// Carries the suggested wait before trying again.
    #[error("Rate limited by provider, retry after {}s", retry_after.as_secs())]
    RateLimited {
        /// Suggested delay derived from the `Retry-After` header.
        retry_after: Duration,
    },

    /// The daily request quota is exhausted (HTTP 429 with quota markers).
    /// Terminal until the next quota period.
    #[error("Provider daily limit reached: {message}")]
    DailyLimitExceeded {
        /// Body text returned by the provider.
        message: String,
    },

    /// The request did not complete within the per-call timeout.
    #[error("Provider request timed out")]
    Timeout,

    /// Connection-level failure (DNS, refused, reset).
    #[error("Network error: {0}")]
    Network(String),

    /// The provider answered with a non-success status other than 404/429.
    #[error("Provider returned HTTP {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        message: String,
    },

    /// The body could not be decoded into the expected payload.
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// The provider has no data for the requested entity.
    #[error("Not found at provider: {0}")]
    NotFound(String),

    /// The circuit breaker is open; the call was not attempted.
    #[error("Provider circuit is open")]
    CircuitOpen,

    /// The caller's cancellation fired before the call could proceed.
    #[error("Provider call cancelled")]
    Cancelled,
}

/// Coarse classification of provider failures, as seen by callers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProviderErrorKind {
    /// Transient throttling; retry after the suggested delay.
    RateLimit,
    /// Quota exhausted for the remaining period.
    DailyLimit,
    /// Network, timeout, 5xx, malformed body or open circuit.
    Unavailable,
    /// Unknown symbol or exchange.
    NotFound,
    /// Cancelled by the caller.
    Cancelled,
}

impl ProviderError {
    /// Returns the retry classification for this error.
    ///
    /// Only transient transport failures are retried by the provider client.
    /// Throttling is never retried inline: the caller decides when to come back.
    ///
    /// # Examples
    ///
    /// ```
    /// use marketcache_market_data::errors::{ProviderError, RetryClass};
    ///
    /// assert_eq!(ProviderError::Timeout.retry_class(), RetryClass::WithBackoff);
    /// assert_eq!(
    ///     ProviderError::NotFound("FOO.US".to_string()).retry_class(),
    ///     RetryClass::Never
    /// );
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Timeout | Self::Network(_) => RetryClass::WithBackoff,
            Self::Server { status, .. } if *status >= 500 => RetryClass::WithBackoff,
            Self::Server { .. }
            | Self::InvalidResponse(_)
            | Self::NotFound(_)
            | Self::RateLimited { .. }
            | Self::DailyLimitExceeded { .. }
            | Self::CircuitOpen
            | Self::Cancelled => RetryClass::Never,
        }
    }

    /// Returns the caller-facing kind of this error.
    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            Self::RateLimited { .. } => ProviderErrorKind::RateLimit,
            Self::DailyLimitExceeded { .. } => ProviderErrorKind::DailyLimit,
            Self::NotFound(_) => ProviderErrorKind::NotFound,
            Self::Cancelled => ProviderErrorKind::Cancelled,
            Self::Timeout
            | Self::Network(_)
            | Self::Server { .. }
            | Self::InvalidResponse(_)
            | Self::CircuitOpen => ProviderErrorKind::Unavailable,
        }
    }

    /// Whether this failure should count against the circuit breaker.
    ///
    /// Throttling and missing data say nothing about provider health.
    pub fn is_circuit_failure(&self) -> bool {
        self.retry_class() == RetryClass::WithBackoff
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}
