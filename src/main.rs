use std::sync::Arc;

use anyhow::Context;
use finboard::api::routes::{AppState, app_router};
use finboard::config::Config;
use finboard::persistence;
use finboard::poller::spawn_price_poller;
use finboard::prices::PriceService;
use finboard::telemetry::init_tracing;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::from_env().context("invalid configuration")?;

    let prices = Arc::new(
        PriceService::from_config(&config.prices)
            .context("failed to build HTTP client for price sources")?,
    );
    let mut app_state = AppState::new(
        prices,
        config.jwt_secret.clone(),
        config.initial_paper_balance,
    );

    match &config.database_url {
        Some(url) => {
            let pool = persistence::create_pool_and_migrate(url, config.db_max_connections)
                .await
                .context("failed to connect to database")?;
            app_state = app_state.with_db(pool);
            app_state
                .hydrate()
                .await
                .context("failed to load state from database")?;
        }
        None => warn!("DATABASE_URL not set, running in memory only"),
    }

    if let Some(seed) = &config.seed_user {
        app_state
            .seed_user(seed)
            .await
            .map_err(anyhow::Error::msg)
            .context("failed to seed login")?;
    }

    if !config.prices.poll_interval.is_zero() {
        spawn_price_poller(app_state.clone(), config.prices.poll_interval);
    }

    let app = app_router(app_state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
