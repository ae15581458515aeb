//! Provider client: the only path to the market data provider.
//!
//! Every call goes through the same pipeline:
//! 1. Circuit breaker check
//! 2. Rate governor permit (cancellable)
//! 3. Provider call under a fixed timeout
//! 4. Circuit breaker bookkeeping
//! 5. Bounded exponential backoff retry for transient failures (back to step 1)
//!
//! Outcomes are always returned as `Result<T, ProviderError>`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use super::{CircuitBreaker, CircuitBreakerConfig, RateGovernor, RetryPolicy};
use crate::errors::{ProviderError, RetryClass};
use crate::models::{Exchange, Fundamentals, HistoricalPrice, Quote, Symbol};
use crate::provider::MarketDataProvider;

/// Default per-call timeout.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider client configuration.
#[derive(Clone, Debug)]
pub struct ProviderClientConfig {
    /// Timeout applied to each individual attempt.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for ProviderClientConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            retry: RetryPolicy::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Resilient, rate-governed access to the market data provider.
///
/// Cheap to share behind an `Arc`; the read-through cache and the backfill
/// orchestrator use the same instance and therefore the same [`RateGovernor`].
pub struct ProviderClient {
    provider: Arc<dyn MarketDataProvider>,
    governor: Arc<RateGovernor>,
    circuit_breaker: CircuitBreaker,
    retry: RetryPolicy,
    call_timeout: Duration,
}

impl ProviderClient {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        governor: Arc<RateGovernor>,
        config: ProviderClientConfig,
    ) -> Self {
        Self {
            provider,
            governor,
            circuit_breaker: CircuitBreaker::with_config(config.circuit_breaker),
            retry: config.retry,
            call_timeout: config.call_timeout,
        }
    }

    /// The shared rate governor.
    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub async fn list_exchanges(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Exchange>, ProviderError> {
        self.call("exchanges", cancel, |p| async move { p.list_exchanges().await })
            .await
    }

    pub async fn list_symbols(
        &self,
        exchange_code: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Symbol>, ProviderError> {
        self.call("symbols", cancel, |p| async move {
            p.list_symbols(exchange_code).await
        })
        .await
    }

    pub async fn get_quote(
        &self,
        full_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Quote, ProviderError> {
        self.call("quote", cancel, |p| async move { p.get_quote(full_symbol).await })
            .await
    }

    pub async fn get_historical_prices(
        &self,
        full_symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<Vec<HistoricalPrice>, ProviderError> {
        self.call("history", cancel, |p| async move {
            p.get_historical_prices(full_symbol, from, to).await
        })
        .await
    }

    pub async fn get_fundamentals(
        &self,
        full_symbol: &str,
        cancel: &CancellationToken,
    ) -> Result<Fundamentals, ProviderError> {
        self.call("fundamentals", cancel, |p| async move {
            p.get_fundamentals(full_symbol).await
        })
        .await
    }

    async fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
        request: F,
    ) -> Result<T, ProviderError>
    where
        F: Fn(Arc<dyn MarketDataProvider>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut retry = 0u32;

        loop {
            if !self.circuit_breaker.is_allowed() {
                debug!(
                    "Circuit open for provider '{}', rejecting {}",
                    self.provider.id(),
                    operation
                );
                return Err(ProviderError::CircuitOpen);
            }

            self.governor.acquire(cancel).await?;

            let outcome =
                match tokio::time::timeout(self.call_timeout, request(Arc::clone(&self.provider)))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout),
                };

            let error = match outcome {
                Ok(value) => {
                    self.circuit_breaker.record_success();
                    return Ok(value);
                }
                Err(error) => error,
            };

            if error.is_circuit_failure() {
                self.circuit_breaker.record_failure();
            }

            if error.retry_class() != RetryClass::WithBackoff || retry >= self.retry.max_retries {
                if retry > 0 {
                    info!(
                        "Provider '{}' {} failed after {} retries: {}",
                        self.provider.id(),
                        operation,
                        retry,
                        error
                    );
                }
                return Err(error);
            }

            let delay = self.retry.backoff_for(retry);
            retry += 1;
            warn!(
                "Provider '{}' {} failed ({}), retry {}/{} in {:?}",
                self.provider.id(),
                operation,
                error,
                retry,
                self.retry.max_retries,
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{CircuitState, RateGovernorConfig};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Provider that replays scripted fundamentals outcomes.
    #[derive(Default)]
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<Result<(), ProviderError>>>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<Result<(), ProviderError>>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MarketDataProvider for ScriptedProvider {
        fn id(&self) -> &'static str {
            "SCRIPTED"
        }

        async fn list_exchanges(&self) -> Result<Vec<Exchange>, ProviderError> {
            Ok(vec![])
        }

        async fn list_symbols(&self, _exchange_code: &str) -> Result<Vec<Symbol>, ProviderError> {
            Ok(vec![])
        }

        async fn get_quote(&self, full_symbol: &str) -> Result<Quote, ProviderError> {
            Err(ProviderError::NotFound(full_symbol.to_string()))
        }

        async fn get_historical_prices(
            &self,
            _full_symbol: &str,
            _from: NaiveDate,
            _to: NaiveDate,
        ) -> Result<Vec<HistoricalPrice>, ProviderError> {
            Ok(vec![])
        }

        async fn get_fundamentals(&self, full_symbol: &str) -> Result<Fundamentals, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.outcomes.lock().unwrap().pop_front().unwrap_or(Ok(()));
            next.map(|_| Fundamentals::from_document(full_symbol, json!({"General": {}})))
        }
    }

    fn client(provider: Arc<ScriptedProvider>, config: ProviderClientConfig) -> ProviderClient {
        ProviderClient::new(provider, Arc::new(RateGovernor::default()), config)
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(50),
            multiplier: 2.0,
            jitter_factor: 0.0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Timeout),
            Err(ProviderError::Server {
                status: 502,
                message: "Bad Gateway".to_string(),
            }),
            Ok(()),
        ]));
        let client = client(
            provider.clone(),
            ProviderClientConfig {
                retry: fast_retry(3),
                ..Default::default()
            },
        );

        let result = client
            .get_fundamentals("AAPL.US", &CancellationToken::new())
            .await;

        assert!(result.is_ok());
        assert_eq!(provider.calls(), 3);
        assert_eq!(client.circuit_breaker().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_bounded() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Network("reset".to_string())),
            Err(ProviderError::Network("reset".to_string())),
            Err(ProviderError::Network("reset".to_string())),
        ]));
        let client = client(
            provider.clone(),
            ProviderClientConfig {
                retry: fast_retry(2),
                ..Default::default()
            },
        );

        let result = client
            .get_fundamentals("AAPL.US", &CancellationToken::new())
            .await;

        assert_eq!(result, Err(ProviderError::Network("reset".to_string())));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttling_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::new(vec![Err(
            ProviderError::DailyLimitExceeded {
                message: "Daily limit exceeded".to_string(),
            },
        )]));
        let client = client(
            provider.clone(),
            ProviderClientConfig {
                retry: fast_retry(3),
                ..Default::default()
            },
        );

        let result = client
            .get_fundamentals("AAPL.US", &CancellationToken::new())
            .await;

        assert!(matches!(
            result,
            Err(ProviderError::DailyLimitExceeded { .. })
        ));
        assert_eq!(provider.calls(), 1);
        assert_eq!(client.circuit_breaker().failure_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let provider = Arc::new(ScriptedProvider {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        });
        let client = client(
            provider.clone(),
            ProviderClientConfig {
                call_timeout: Duration::from_secs(1),
                retry: RetryPolicy::none(),
                ..Default::default()
            },
        );

        let result = client
            .get_fundamentals("AAPL.US", &CancellationToken::new())
            .await;

        assert_eq!(result, Err(ProviderError::Timeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_circuit_short_circuits_calls() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Timeout),
            Err(ProviderError::Timeout),
        ]));
        let client = client(
            provider.clone(),
            ProviderClientConfig {
                retry: RetryPolicy::none(),
                circuit_breaker: CircuitBreakerConfig {
                    failure_threshold: 2,
                    recovery_timeout: Duration::from_secs(600),
                    half_open_success_threshold: 1,
                },
                ..Default::default()
            },
        );
        let cancel = CancellationToken::new();

        let _ = client.get_fundamentals("A.US", &cancel).await;
        let _ = client.get_fundamentals("B.US", &cancel).await;
        assert_eq!(client.circuit_breaker().state(), CircuitState::Open);

        let result = client.get_fundamentals("C.US", &cancel).await;
        assert_eq!(result, Err(ProviderError::CircuitOpen));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_takes_a_permit() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            Err(ProviderError::Timeout),
            Ok(()),
        ]));
        let governor = Arc::new(RateGovernor::new(RateGovernorConfig {
            permits_per_window: 10,
            window: Duration::from_secs(60),
        }));
        let client = ProviderClient::new(
            provider,
            governor.clone(),
            ProviderClientConfig {
                retry: fast_retry(1),
                ..Default::default()
            },
        );

        client
            .get_fundamentals("AAPL.US", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(governor.available_permits(), 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_permit() {
        let provider = Arc::new(ScriptedProvider::default());
        let client = client(provider.clone(), ProviderClientConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = client.get_fundamentals("AAPL.US", &cancel).await;

        assert_eq!(result, Err(ProviderError::Cancelled));
        assert_eq!(provider.calls(), 0);
    }
}
