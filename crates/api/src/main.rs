use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use ezbiz_api::app::{router, AppState, Stores};
use ezbiz_api::config::Config;
use ezbiz_api::middleware::{init_metrics, logging::init_logging};
use ezbiz_api::services::ConsoleEmailSender;

const THROTTLE_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    init_logging(&config.logging)?;
    init_metrics()?;

    info!("Starting EZ Biz API v{}", env!("CARGO_PKG_VERSION"));

    let pool =
        persistence::db::create_pool(&persistence::db::DatabaseConfig::from(&config.database))
            .await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let addr = config.socket_addr()?;
    let sender = Arc::new(ConsoleEmailSender::new(config.email.clone()));
    if !sender.is_enabled() {
        info!("Account email disabled; verification and reset links will not be delivered");
    }
    let state = AppState::new(config, Stores::postgres(&pool), sender, Some(pool));

    if let Some(throttle) = state.throttle.clone() {
        info!(per_minute = throttle.per_minute(), "Per-IP throttle enabled");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(THROTTLE_PRUNE_INTERVAL);
            loop {
                interval.tick().await;
                throttle.prune();
            }
        });
    }

    let app = router(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
