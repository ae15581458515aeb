//! Background scheduler for periodic fundamentals backfills.
//!
//! Every interval, backfills each configured exchange in turn. Runs share the
//! process-wide provider client, so they compete with interactive reads for the
//! same rate budget.

use std::sync::Arc;
use std::time::Duration;

use marketcache_core::backfill::RunOutcome;
use marketcache_core::errors::ErrorKind;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::main_lib::AppState;

/// Initial delay before the first run, so the server is up before quota is spent.
const INITIAL_DELAY: Duration = Duration::from_secs(60);

/// Starts the background backfill scheduler. Does nothing without exchanges.
pub fn start_backfill_scheduler(state: Arc<AppState>, exchanges: Vec<String>, every: Duration) {
    if exchanges.is_empty() {
        info!("Backfill scheduler disabled: no exchanges configured");
        return;
    }

    tokio::spawn(async move {
        info!(
            "Backfill scheduler started for {:?} (every {:?})",
            exchanges, every
        );
        let shutdown = state.shutdown.clone();

        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = tokio::time::sleep(INITIAL_DELAY) => {}
        }

        let mut ticks = interval(every);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticks.tick() => run_scheduled_backfills(&state, &exchanges).await,
            }
        }
        info!("Backfill scheduler stopped");
    });
}

async fn run_scheduled_backfills(state: &Arc<AppState>, exchanges: &[String]) {
    for code in exchanges {
        if state.shutdown.is_cancelled() {
            return;
        }
        let cancel = state.shutdown.child_token();
        match state.backfill.backfill(code, None, &cancel).await {
            Ok(result) => {
                info!(
                    "Scheduled backfill of {} finished ({:?}): {} processed, {} successful, {} failed, {} rate limited",
                    code,
                    result.outcome,
                    result.processed,
                    result.successful,
                    result.failed,
                    result.rate_limit_hits
                );
                // The quota is shared; the remaining exchanges would fail the same way.
                if result.outcome == RunOutcome::AbortedDailyLimit {
                    warn!("Daily provider limit reached, skipping remaining exchanges");
                    return;
                }
            }
            Err(e) if e.kind() == ErrorKind::Conflict => {
                info!("Scheduled backfill of {} skipped: {}", code, e);
            }
            Err(e) => warn!("Scheduled backfill of {} failed: {}", code, e),
        }
    }
}
