use std::{net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use marketcache_core::settings::{BackfillSettings, CacheSettings};
use marketcache_core::constants::*;
use marketcache_market_data::provider::eodhd::DEFAULT_BASE_URL;

pub struct Config {
    pub listen_addr: SocketAddr,
    pub db_path: String,
    pub cors_allow: Vec<String>,
    pub request_timeout: Duration,
    pub provider_base_url: String,
    pub provider_api_token: String,
    pub provider_timeout: Duration,
    pub rate_limit_permits: u32,
    pub rate_limit_window: Duration,
    pub cache: CacheSettings,
    pub backfill: BackfillSettings,
    /// Exchanges the scheduler backfills. Empty disables the scheduler.
    pub backfill_exchanges: Vec<String>,
    pub backfill_interval: Duration,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid {}={:?}: {}", name, raw, e)),
        _ => Ok(default),
    }
}

fn list_var(name: &str, default: &str) -> Vec<String> {
    var_or(name, default)
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = var_or("MC_LISTEN_ADDR", "0.0.0.0:8080")
            .parse()
            .context("Invalid MC_LISTEN_ADDR")?;
        let db_path = var_or("MC_DB_PATH", "./db/marketcache.db");
        let cors_allow = list_var("MC_CORS_ALLOW_ORIGINS", "*");
        let timeout_ms: u64 = parse_var("MC_REQUEST_TIMEOUT_MS", 30_000)?;

        let cache = CacheSettings::from_hours(
            parse_var("MC_TTL_EXCHANGES_HOURS", DEFAULT_EXCHANGES_TTL_HOURS)?,
            parse_var("MC_TTL_SYMBOLS_HOURS", DEFAULT_SYMBOLS_TTL_HOURS)?,
            parse_var("MC_TTL_QUOTES_HOURS", DEFAULT_QUOTES_TTL_HOURS)?,
            parse_var("MC_TTL_HISTORY_HOURS", DEFAULT_HISTORY_TTL_HOURS)?,
            parse_var("MC_TTL_FUNDAMENTALS_HOURS", DEFAULT_FUNDAMENTALS_TTL_HOURS)?,
        )?;

        let ledger_max_age_days: i64 = parse_var("MC_LEDGER_MAX_AGE_DAYS", 0)?;
        let backfill = BackfillSettings {
            batch_size: parse_var("MC_BULK_BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            concurrency: parse_var("MC_BULK_CONCURRENCY", DEFAULT_BACKFILL_CONCURRENCY)?,
            ledger_max_age: (ledger_max_age_days > 0)
                .then(|| chrono::Duration::days(ledger_max_age_days)),
            ..BackfillSettings::default()
        };
        backfill.validate()?;

        let interval_hours: u64 = parse_var("MC_BACKFILL_INTERVAL_HOURS", 24)?;
        if interval_hours == 0 {
            return Err(anyhow!("MC_BACKFILL_INTERVAL_HOURS must be at least 1"));
        }

        Ok(Self {
            listen_addr,
            db_path,
            cors_allow,
            request_timeout: Duration::from_millis(timeout_ms),
            provider_base_url: var_or("MC_PROVIDER_BASE_URL", DEFAULT_BASE_URL),
            provider_api_token: var_or("MC_PROVIDER_API_TOKEN", "demo"),
            provider_timeout: Duration::from_secs(parse_var("MC_PROVIDER_TIMEOUT_SECS", 30)?),
            rate_limit_permits: parse_var("MC_RATE_LIMIT_PERMITS", 1000)?,
            rate_limit_window: Duration::from_secs(parse_var("MC_RATE_LIMIT_WINDOW_SECS", 60)?),
            cache,
            backfill,
            backfill_exchanges: list_var("MC_BACKFILL_EXCHANGES", ""),
            backfill_interval: Duration::from_secs(interval_hours * 60 * 60),
        })
    }
}
