//! Watcher metrics.
//!
//! Provides atomic counters for the watcher loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Metrics for the watcher.
#[derive(Debug)]
pub struct WatchMetrics {
    /// New notifications seen on the live stream.
    notifications_received: AtomicU64,

    /// Successful stats refreshes.
    refreshes: AtomicU64,

    /// Failed stats refreshes.
    refresh_failures: AtomicU64,

    /// Poll cycles run while live updates were unavailable.
    fallback_polls: AtomicU64,

    /// Start time for uptime.
    start_time: Instant,
}

impl Default for WatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            notifications_received: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
            refresh_failures: AtomicU64::new(0),
            fallback_polls: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Records a new notification.
    pub fn record_notification(&self) {
        self.notifications_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a refresh outcome.
    pub fn record_refresh(&self, success: bool) {
        if success {
            self.refreshes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.refresh_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records a fallback poll.
    pub fn record_fallback_poll(&self) {
        self.fallback_polls.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns new notifications seen.
    #[must_use]
    pub fn notifications_received(&self) -> u64 {
        self.notifications_received.load(Ordering::Relaxed)
    }

    /// Returns successful refreshes.
    #[must_use]
    pub fn refreshes(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    /// Returns failed refreshes.
    #[must_use]
    pub fn refresh_failures(&self) -> u64 {
        self.refresh_failures.load(Ordering::Relaxed)
    }

    /// Returns fallback polls.
    #[must_use]
    pub fn fallback_polls(&self) -> u64 {
        self.fallback_polls.load(Ordering::Relaxed)
    }

    /// Returns time since start.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }
}
