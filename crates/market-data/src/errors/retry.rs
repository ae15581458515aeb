/// Classification for retry policy.
///
/// Used by the provider client to decide whether a failed call is attempted again
/// before the error is handed back to the caller.
///
/// | Class | Retried inline? | Counts against circuit breaker? |
/// |-------|-----------------|---------------------------------|
/// | `Never` | No | No |
/// | `WithBackoff` | Yes, bounded exponential backoff | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Never retry - throttling, missing data, malformed body or cancellation.
    Never,

    /// Transient transport failure (timeout, connection error, 5xx).
    /// Retried with backoff, re-acquiring a rate permit for every attempt.
    WithBackoff,
}
