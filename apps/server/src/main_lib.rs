use std::sync::Arc;

use crate::config::Config;
use marketcache_core::{
    backfill::BackfillService,
    cache::MarketDataCache,
    clock::{Clock, SystemClock},
    ledger::UnavailabilityLedger,
};
use marketcache_market_data::{
    EodhdProvider, MarketDataProvider, ProviderClient, ProviderClientConfig, RateGovernor,
    RateGovernorConfig,
};
use marketcache_storage_sqlite::{db, MarketCacheRepository, UnavailabilityRepository};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

pub struct AppState {
    pub cache: Arc<MarketDataCache>,
    pub backfill: Arc<BackfillService>,
    pub ledger: Arc<dyn UnavailabilityLedger>,
    /// Root token; cancelled on shutdown.
    pub shutdown: CancellationToken,
}

pub fn init_tracing() {
    let log_format = std::env::var("MC_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

pub async fn build_state(config: &Config, shutdown: CancellationToken) -> anyhow::Result<Arc<AppState>> {
    let (pool, writer) = db::open(&config.db_path)?;
    tracing::info!("Database path in use: {}", config.db_path);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MarketCacheRepository::new(pool.clone(), writer.clone()));
    let ledger: Arc<dyn UnavailabilityLedger> = Arc::new(UnavailabilityRepository::new(
        pool.clone(),
        writer.clone(),
        clock.clone(),
    ));

    // One governor per process: interactive reads and backfills draw from the same budget.
    let governor = Arc::new(RateGovernor::new(RateGovernorConfig {
        permits_per_window: config.rate_limit_permits,
        window: config.rate_limit_window,
    }));
    let provider: Arc<dyn MarketDataProvider> = Arc::new(EodhdProvider::new(
        config.provider_base_url.clone(),
        config.provider_api_token.clone(),
        config.provider_timeout,
    ));
    let client = Arc::new(ProviderClient::new(
        provider,
        governor,
        ProviderClientConfig {
            call_timeout: config.provider_timeout,
            ..ProviderClientConfig::default()
        },
    ));
    tracing::info!(
        "Provider {} governed at {} calls per {:?}",
        config.provider_base_url,
        config.rate_limit_permits,
        config.rate_limit_window
    );

    let cache = Arc::new(
        MarketDataCache::new(
            client.clone(),
            store.clone(),
            ledger.clone(),
            clock.clone(),
            config.cache.clone(),
        )
        .with_cancellation(shutdown.clone()),
    );
    let backfill = Arc::new(BackfillService::new(
        client,
        store,
        ledger.clone(),
        clock,
        config.backfill.clone(),
        config.cache.fundamentals_ttl,
    ));

    Ok(Arc::new(AppState {
        cache,
        backfill,
        ledger,
        shutdown,
    }))
}
