//! Cached query invalidation.
//!
//! The realtime stream never carries full collections. It tells the local
//! data layer which cached entries are stale, and views refetch them from
//! the REST API.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

/// Cache key of the notification list and stats.
pub const NOTIFICATIONS_KEY: &str = "notifications";

/// Default capacity of the invalidation feed.
pub const DEFAULT_FEED_CAPACITY: usize = 64;

/// A local cache whose entries can be marked stale.
pub trait QueryCache: Send + Sync + 'static {
    /// Marks every entry under `key` as stale.
    fn invalidate(&self, key: &str);
}

/// One invalidation event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invalidation {
    /// Invalidated key.
    pub key: String,
    /// How many times `key` has been invalidated, including this one.
    pub generation: u64,
}

/// In-process invalidation feed.
///
/// Keeps a generation counter per key, so a view can tell whether its data
/// predates the latest invalidation, and broadcasts every invalidation to
/// subscribed views.
#[derive(Debug)]
pub struct InvalidationBus {
    generations: Mutex<HashMap<String, u64>>,
    feed: broadcast::Sender<Invalidation>,
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl InvalidationBus {
    /// Creates a bus whose feed buffers up to `capacity` events per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(capacity.max(1));
        Self {
            generations: Mutex::new(HashMap::new()),
            feed,
        }
    }

    /// Subscribes to future invalidations.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Invalidation> {
        self.feed.subscribe()
    }

    /// Returns how many times `key` has been invalidated.
    #[must_use]
    pub fn generation(&self, key: &str) -> u64 {
        self.generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }
}

impl QueryCache for InvalidationBus {
    fn invalidate(&self, key: &str) {
        let generation = {
            let mut generations = self.generations.lock().unwrap_or_else(PoisonError::into_inner);
            let counter = generations.entry(key.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };

        debug!(key, generation, "cache entry invalidated");
        // No receivers is fine: nobody is showing the data right now.
        let _ = self.feed.send(Invalidation {
            key: key.to_string(),
            generation,
        });
    }
}
