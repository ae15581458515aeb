//! Bulk fundamentals backfill.
//!
//! A run walks every symbol of one exchange that has no cached fundamentals and is not
//! in the unavailability ledger, in sequential batches:
//!
//! ```text
//! Idle → Batching → Fetching(1) → Cooldown|NextBatch → Fetching(2) → ... → Completed
//!                        │                                   │
//!                        └──── daily limit ──► AbortedDailyLimit    cancel ──► Cancelled
//! ```
//!
//! Within a batch a fixed pool of workers drains a bounded queue. Every provider call
//! goes through the shared [`ProviderClient`], so the run competes for the same
//! permits as interactive reads.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Duration;
use futures::future;
use log::{debug, info, warn};
use marketcache_market_data::{ProviderClient, ProviderError, Symbol};
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

use super::model::{BackfillPhase, BatchStats, BulkRunResult, RunOutcome};
use crate::cache::MarketCacheStore;
use crate::clock::Clock;
use crate::errors::{Error, Result};
use crate::ledger::{SymbolKey, UnavailabilityLedger};
use crate::settings::BackfillSettings;

/// Outcome of one symbol's fetch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SymbolOutcome {
    Success,
    Failed,
    RateLimited,
    DailyLimit,
    /// Cancelled before reaching the provider; not counted.
    Cancelled,
}

impl BatchStats {
    fn record(&mut self, outcome: SymbolOutcome) {
        match outcome {
            SymbolOutcome::Cancelled => return,
            SymbolOutcome::Success => self.successful += 1,
            SymbolOutcome::Failed => self.failed += 1,
            SymbolOutcome::RateLimited => self.rate_limit_hits += 1,
            SymbolOutcome::DailyLimit => self.daily_limit_hit = true,
        }
        self.processed += 1;
    }
}

/// Exchanges with a run in progress. Released when the guard drops.
struct RunGuard {
    exchange_code: String,
    running: Arc<Mutex<HashSet<String>>>,
}

impl RunGuard {
    fn try_acquire(running: &Arc<Mutex<HashSet<String>>>, exchange_code: &str) -> Option<Self> {
        let mut active = running.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(exchange_code.to_string()) {
            return None;
        }
        Some(Self {
            exchange_code: exchange_code.to_string(),
            running: Arc::clone(running),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut active = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        active.remove(&self.exchange_code);
    }
}

/// Bulk backfill orchestrator.
pub struct BackfillService {
    client: Arc<ProviderClient>,
    store: Arc<dyn MarketCacheStore>,
    ledger: Arc<dyn UnavailabilityLedger>,
    clock: Arc<dyn Clock>,
    settings: BackfillSettings,
    fundamentals_ttl: Duration,
    running: Arc<Mutex<HashSet<String>>>,
}

impl BackfillService {
    pub fn new(
        client: Arc<ProviderClient>,
        store: Arc<dyn MarketCacheStore>,
        ledger: Arc<dyn UnavailabilityLedger>,
        clock: Arc<dyn Clock>,
        settings: BackfillSettings,
        fundamentals_ttl: Duration,
    ) -> Self {
        Self {
            client,
            store,
            ledger,
            clock,
            settings,
            fundamentals_ttl,
            running: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn settings(&self) -> &BackfillSettings {
        &self.settings
    }

    pub fn is_running(&self, exchange_code: &str) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(exchange_code)
    }

    /// Fetch fundamentals for every symbol of `exchange_code` that lacks them.
    ///
    /// `batch_size` defaults to the configured size. Cancelling `cancel` stops the run at
    /// the next permit acquisition or delay and returns the counters gathered so far.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty exchange code or a zero batch size
    /// - `Conflict` if a run for the same exchange is in progress
    /// - `NotFound` if no symbols are cached for the exchange
    /// - storage errors while loading the work set
    pub async fn backfill(
        &self,
        exchange_code: &str,
        batch_size: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<BulkRunResult> {
        let exchange_code = exchange_code.trim();
        if exchange_code.is_empty() {
            return Err(Error::Validation("exchange code is required".to_string()));
        }
        let batch_size = batch_size.unwrap_or(self.settings.batch_size);
        if batch_size == 0 {
            return Err(Error::Validation("batch size must be at least 1".to_string()));
        }

        let _guard = RunGuard::try_acquire(&self.running, exchange_code).ok_or_else(|| {
            Error::Conflict(format!(
                "A backfill for exchange '{}' is already running",
                exchange_code
            ))
        })?;

        let mut phase = BackfillPhase::Idle;
        let mut result = BulkRunResult::new(exchange_code, self.clock.now());

        self.purge_aged_records().await;

        let symbols = self.store.all_symbols(exchange_code)?;
        if symbols.is_empty() {
            return Err(Error::NotFound(format!(
                "No symbols cached for exchange '{}'",
                exchange_code
            )));
        }
        result.total_symbols = symbols.len();

        let with_data = self.store.fundamentals_symbols(exchange_code)?;
        let without_data: Vec<Symbol> = symbols
            .into_iter()
            .filter(|s| !with_data.contains(&s.ticker))
            .collect();
        result.symbols_without_data = without_data.len();

        let marked = self.ledger.marked_tickers(exchange_code)?;
        let (skipped, work): (Vec<Symbol>, Vec<Symbol>) = without_data
            .into_iter()
            .partition(|s| marked.contains(&s.ticker));
        result.skipped_no_data = skipped.len();

        self.enter(exchange_code, &mut phase, BackfillPhase::Batching);
        info!(
            "Backfill {}: {} symbols, {} without fundamentals, {} skipped by ledger, {} to fetch in batches of {}",
            exchange_code,
            result.total_symbols,
            result.symbols_without_data,
            result.skipped_no_data,
            work.len(),
            batch_size
        );

        // Cancelled by the caller, or by a worker that hit the daily limit.
        let run = cancel.child_token();
        let batches: Vec<&[Symbol]> = work.chunks(batch_size).collect();
        let mut outcome = RunOutcome::Completed;

        for (index, batch) in batches.iter().enumerate() {
            if cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }

            let batch_no = index + 1;
            self.enter(
                exchange_code,
                &mut phase,
                BackfillPhase::Fetching { batch: batch_no },
            );
            let stats = self.run_batch(batch, &run).await;
            result.absorb(&stats);
            debug!(
                "Backfill {}: batch {}/{} settled: {:?}",
                exchange_code,
                batch_no,
                batches.len(),
                stats
            );

            if stats.daily_limit_hit {
                outcome = RunOutcome::AbortedDailyLimit;
                break;
            }
            if cancel.is_cancelled() {
                outcome = RunOutcome::Cancelled;
                break;
            }
            if batch_no == batches.len() {
                break;
            }

            let delay = if stats.rate_limit_hits > 0 {
                self.enter(exchange_code, &mut phase, BackfillPhase::Cooldown);
                self.settings.cooldown_for(stats.rate_limit_hits)
            } else {
                self.enter(exchange_code, &mut phase, BackfillPhase::NextBatch);
                self.settings.inter_batch_delay
            };

            let waited_from = Instant::now();
            let cancelled = tokio::select! {
                _ = cancel.cancelled() => true,
                _ = sleep(delay) => false,
            };
            result.total_wait_time += waited_from.elapsed();
            if cancelled {
                outcome = RunOutcome::Cancelled;
                break;
            }
        }

        result.outcome = outcome;
        result.completed_at = self.clock.now();
        self.enter(exchange_code, &mut phase, BackfillPhase::Finished(outcome));
        info!(
            "Backfill {} {}: processed {}, successful {}, failed {}, rate limited {}, {} batches, waited {:?}",
            exchange_code,
            phase,
            result.processed,
            result.successful,
            result.failed,
            result.rate_limit_hits,
            result.batches_processed,
            result.total_wait_time
        );

        Ok(result)
    }

    fn enter(&self, exchange_code: &str, phase: &mut BackfillPhase, next: BackfillPhase) {
        debug!("Backfill {}: {} -> {}", exchange_code, phase, next);
        *phase = next;
    }

    async fn purge_aged_records(&self) {
        let Some(max_age) = self.settings.ledger_max_age else {
            return;
        };
        let cutoff = self.clock.now() - max_age;
        match self.ledger.purge_older_than(cutoff).await {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} ledger records last attempted before {}", purged, cutoff),
            Err(e) => warn!("Failed to purge aged ledger records: {}", e),
        }
    }

    /// Run one batch through the worker pool and wait for every worker to settle.
    async fn run_batch(&self, batch: &[Symbol], run: &CancellationToken) -> BatchStats {
        let workers = self.settings.concurrency.clamp(1, batch.len().max(1));
        let (tx, rx) = mpsc::channel::<&Symbol>(workers);
        let queue = tokio::sync::Mutex::new(rx);
        let stats = Mutex::new(BatchStats::default());

        let feeder = async move {
            for symbol in batch {
                tokio::select! {
                    _ = run.cancelled() => break,
                    sent = tx.send(symbol) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        };
        let pool = future::join_all(
            (0..workers).map(|index| self.worker(index, &queue, run, &stats)),
        );
        tokio::join!(feeder, pool);

        stats.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    async fn worker(
        &self,
        index: usize,
        queue: &tokio::sync::Mutex<mpsc::Receiver<&Symbol>>,
        run: &CancellationToken,
        stats: &Mutex<BatchStats>,
    ) {
        let stagger = self
            .settings
            .worker_stagger
            .saturating_mul(u32::try_from(index).unwrap_or(u32::MAX));
        if !stagger.is_zero() {
            tokio::select! {
                _ = run.cancelled() => return,
                _ = sleep(stagger) => {}
            }
        }

        loop {
            let next = queue.lock().await.recv().await;
            let Some(symbol) = next else {
                break;
            };
            if run.is_cancelled() {
                break;
            }

            let outcome = self.fetch_symbol(symbol, run).await;
            if outcome == SymbolOutcome::DailyLimit {
                run.cancel();
            }
            stats
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .record(outcome);
        }
    }

    async fn fetch_symbol(&self, symbol: &Symbol, run: &CancellationToken) -> SymbolOutcome {
        let key = SymbolKey::new(&symbol.ticker, &symbol.exchange_code);
        let full_symbol = key.full_symbol();

        match self.client.get_fundamentals(&full_symbol, run).await {
            Ok(fundamentals) => {
                let fetched_at = self.clock.now();
                if let Err(e) = self
                    .store
                    .upsert_fundamentals(&fundamentals, fetched_at, self.fundamentals_ttl)
                    .await
                {
                    warn!("Failed to store fundamentals for {}: {}", full_symbol, e);
                    return SymbolOutcome::Failed;
                }
                if let Err(e) = self.ledger.clear(&key).await {
                    warn!("Failed to clear ledger record for {}: {}", full_symbol, e);
                }
                SymbolOutcome::Success
            }
            Err(ProviderError::Cancelled) => SymbolOutcome::Cancelled,
            Err(ProviderError::DailyLimitExceeded { message }) => {
                warn!(
                    "Daily limit reached while fetching {}: {}",
                    full_symbol, message
                );
                SymbolOutcome::DailyLimit
            }
            Err(ProviderError::RateLimited { retry_after }) => {
                debug!(
                    "Rate limited on {} (retry after {:?})",
                    full_symbol, retry_after
                );
                SymbolOutcome::RateLimited
            }
            // Says nothing about this symbol.
            Err(ProviderError::CircuitOpen) => {
                debug!("Circuit open, {} not attempted", full_symbol);
                SymbolOutcome::Failed
            }
            Err(e) => {
                debug!("No fundamentals for {}: {}", full_symbol, e);
                if let Err(le) = self.ledger.mark_failed(&key, &e.to_string()).await {
                    warn!("Failed to record {} in ledger: {}", full_symbol, le);
                }
                SymbolOutcome::Failed
            }
        }
    }
}
