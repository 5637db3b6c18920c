//! Main watcher service.
//!
//! Keeps a notification binding open, refreshes the unread counters whenever
//! the live stream invalidates them, and polls the REST API instead while
//! live updates are unavailable.

use std::future::Future;
use std::sync::Arc;

use slate_sdk::cache::{InvalidationBus, QueryCache, NOTIFICATIONS_KEY};
use slate_sdk::client::{ClientError, NotificationStats, NotificationsClient};
use slate_sdk::ws::{
    BindingOptions, ConnectionManager, ConnectionStatus, CredentialProvider, NotificationBinding,
    StaticCredentials, WsError,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::{ConfigError, WatchConfig};
use super::metrics::WatchMetrics;

/// Errors starting the watcher.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The connection manager could not be created.
    #[error("notification stream: {0}")]
    Stream(#[from] WsError),

    /// The REST client could not be created.
    #[error("notification api: {0}")]
    Client(#[from] ClientError),
}

/// The notification watcher.
pub struct WatchService {
    config: WatchConfig,
    manager: ConnectionManager,
    client: NotificationsClient,
    cache: Arc<InvalidationBus>,
    metrics: Arc<WatchMetrics>,
    last_stats: RwLock<Option<NotificationStats>>,
}

impl WatchService {
    /// Creates a watcher on the process-wide notifications manager.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: WatchConfig) -> Result<Self, WatchError> {
        config.validate()?;

        let credentials: Arc<dyn CredentialProvider> = match &config.access_token {
            Some(token) => Arc::new(StaticCredentials::new(token)),
            None => Arc::new(StaticCredentials::anonymous()),
        };
        let manager = ConnectionManager::shared(config.ws_config(), credentials)?;
        let client = NotificationsClient::new(config.client_config())?;

        Ok(Self::with_parts(config, manager, client))
    }

    /// Creates a watcher from prebuilt parts.
    #[must_use]
    pub fn with_parts(
        config: WatchConfig,
        manager: ConnectionManager,
        client: NotificationsClient,
    ) -> Self {
        Self {
            config,
            manager,
            client,
            cache: Arc::new(InvalidationBus::default()),
            metrics: Arc::new(WatchMetrics::new()),
            last_stats: RwLock::new(None),
        }
    }

    /// Returns the metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<WatchMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Returns the connection manager.
    #[must_use]
    pub const fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Returns the most recently fetched stats.
    pub async fn last_stats(&self) -> Option<NotificationStats> {
        self.last_stats.read().await.clone()
    }

    /// Fetches the unread counters.
    ///
    /// Failures are logged and counted; the previous stats are kept.
    pub async fn refresh(&self) -> Option<NotificationStats> {
        match self.client.notification_stats().await {
            Ok(stats) => {
                info!(total = stats.total, unread = stats.unread, "notification stats");
                *self.last_stats.write().await = Some(stats.clone());
                self.metrics.record_refresh(true);
                Some(stats)
            }
            Err(error) => {
                self.metrics.record_refresh(false);
                warn!(%error, "failed to refresh notification stats");
                None
            }
        }
    }

    /// Runs until `shutdown` completes.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let metrics = Arc::clone(&self.metrics);
        let binding = NotificationBinding::new(
            self.manager.clone(),
            Arc::clone(&self.cache) as Arc<dyn QueryCache>,
            BindingOptions::new().with_on_notification(move |notification| {
                metrics.record_notification();
                info!(
                    id = %notification.id,
                    kind = notification.kind().as_str(),
                    title = %notification.title,
                    "new notification"
                );
            }),
        );
        let mut status = binding.changes();
        let mut invalidations = self.cache.subscribe();

        let period = self.config.poll_interval();
        let mut poll = tokio::time::interval_at(Instant::now() + period, period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);

        info!(api_url = %self.config.api_url, "watching notifications");
        self.refresh().await;

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Ok(()) = status.changed() => {
                    let current = *status.borrow_and_update();
                    log_status(current, self.config.poll_interval_secs);
                }
                received = invalidations.recv() => match received {
                    Ok(invalidation) if invalidation.key == NOTIFICATIONS_KEY => {
                        self.refresh().await;
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "invalidation feed lagged");
                        self.refresh().await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = poll.tick() => {
                    if !binding.is_connected() {
                        self.metrics.record_fallback_poll();
                        self.refresh().await;
                    }
                }
            }
        }

        drop(binding);
        info!(
            notifications = self.metrics.notifications_received(),
            refreshes = self.metrics.refreshes(),
            "notification watcher stopped"
        );
    }
}

fn log_status(status: ConnectionStatus, poll_interval_secs: u64) {
    match status {
        ConnectionStatus::Connected => info!("live updates available"),
        ConnectionStatus::Connecting => debug!("connecting to notification stream"),
        ConnectionStatus::Disconnected | ConnectionStatus::Error => warn!(
            %status,
            poll_interval_secs,
            "live updates unavailable, polling"
        ),
    }
}
