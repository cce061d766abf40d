// Payments gateway: rail routing, ledger verification, anchoring and reconciliation over HTTP

use ledger_core::AnchorScheduler;
use payments_gateway::{app, bootstrap, config::Config};
use protocol_core::SystemClock;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Time allowed for queued notifications to drain on shutdown
const NOTIFIER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_line_number(true)
            .init();
    }

    info!("Starting payments gateway");

    let config = Config::load()?;
    let services = bootstrap::build(&config, SystemClock::shared()).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_task = if config.anchor.enabled {
        let scheduler = AnchorScheduler::new(services.state.anchor.clone());
        info!("Anchoring every {:?}", scheduler.period());
        Some(scheduler.spawn(shutdown_rx))
    } else {
        info!("Scheduled anchoring disabled");
        None
    };

    let bind_addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Gateway listening on: {}", bind_addr);

    axum::serve(listener, app(services.state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down");
    let _ = shutdown_tx.send(true);
    if let Some(task) = scheduler_task {
        if let Err(e) = task.await {
            warn!("Anchor scheduler ended abnormally: {}", e);
        }
    }

    if tokio::time::timeout(NOTIFIER_DRAIN_TIMEOUT, services.notifier_task)
        .await
        .is_err()
    {
        warn!("Pending notifications dropped after {:?}", NOTIFIER_DRAIN_TIMEOUT);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
