use marketcache_server::{
    api::app_router, build_state, config::Config, init_tracing,
    scheduler::start_backfill_scheduler,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing();

    let shutdown = CancellationToken::new();
    let state = build_state(&config, shutdown.clone()).await?;

    start_backfill_scheduler(
        state.clone(),
        config.backfill_exchanges.clone(),
        config.backfill_interval,
    );

    let router = app_router(state, &config);
    tracing::info!("Listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down, cancelling running backfills");
            shutdown.cancel();
        })
        .await?;
    Ok(())
}
