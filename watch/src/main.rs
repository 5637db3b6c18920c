//! Slate Watch binary.
//!
//! Entry point for the terminal notification watcher.

use anyhow::Context;
use slate_watch::{WatchConfig, WatchService};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,slate_watch=debug,slate_sdk=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WatchConfig::from_env().context("invalid SLATE_* configuration")?;

    tracing::info!("Starting Slate notification watcher");
    tracing::info!("API URL: {}", config.api_url);
    tracing::info!("Poll interval: {}s", config.poll_interval_secs);
    if config.access_token.is_none() {
        tracing::warn!("SLATE_ACCESS_TOKEN is not set, live updates stay disconnected");
    }

    let service = WatchService::new(config).context("failed to start watcher")?;

    service
        .run(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::warn!(%error, "failed to listen for ctrl-c");
            }
            tracing::info!("Shutting down notification watcher");
        })
        .await;

    let metrics = service.metrics();
    tracing::info!(
        "Watched for {}s: {} new notifications, {} refreshes, {} failed",
        metrics.uptime().as_secs(),
        metrics.notifications_received(),
        metrics.refreshes(),
        metrics.refresh_failures()
    );

    Ok(())
}
