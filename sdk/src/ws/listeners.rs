//! Subscriber registry and fan-out.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::messages::NotificationMessage;
use super::status::ConnectionStatus;

/// Callback receiving status transitions.
pub type StatusListener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

/// Callback receiving parsed inbound messages.
pub type MessageListener = Arc<dyn Fn(&NotificationMessage) + Send + Sync>;

/// Global subscription ID counter.
static SUBSCRIPTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generates a unique subscription ID.
#[must_use]
pub fn next_subscription_id() -> SubscriptionId {
    SubscriptionId(SUBSCRIPTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Identifies one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw token.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

struct Entry {
    on_status: StatusListener,
    on_message: MessageListener,
}

/// Paired status and message listeners keyed by subscription.
///
/// Both callbacks of a subscription are stored in one entry, so the number
/// of status listeners, message listeners and active subscriptions are the
/// same number: [`Listeners::len`].
#[derive(Default)]
pub struct Listeners {
    entries: BTreeMap<SubscriptionId, Entry>,
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("subscriptions", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Listeners {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers both callbacks under `id`.
    pub fn insert(
        &mut self,
        id: SubscriptionId,
        on_status: StatusListener,
        on_message: MessageListener,
    ) {
        self.entries.insert(
            id,
            Entry {
                on_status,
                on_message,
            },
        );
    }

    /// Removes a subscription. Returns false if it was already gone.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Returns true if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sends `status` to a single subscriber. Returns false if it panicked.
    pub fn notify_one(&self, id: SubscriptionId, status: ConnectionStatus) -> bool {
        match self.entries.get(&id) {
            Some(entry) => invoke(id, || (entry.on_status)(status)),
            None => true,
        }
    }

    /// Sends `status` to every subscriber. Returns the number of panics.
    pub fn broadcast_status(&self, status: ConnectionStatus) -> u64 {
        self.entries
            .iter()
            .filter(|(id, entry)| !invoke(**id, || (entry.on_status)(status)))
            .count() as u64
    }

    /// Delivers `message` to every subscriber. Returns the number of panics.
    ///
    /// Each listener runs in isolation: one panicking listener does not
    /// stop delivery to the rest.
    pub fn dispatch(&self, message: &NotificationMessage) -> u64 {
        self.entries
            .iter()
            .filter(|(id, entry)| !invoke(**id, || (entry.on_message)(message)))
            .count() as u64
    }
}

fn invoke(id: SubscriptionId, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(_) => {
            warn!(subscription = %id, "notification listener panicked");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn noop_status() -> StatusListener {
        Arc::new(|_| {})
    }

    fn noop_message() -> MessageListener {
        Arc::new(|_| {})
    }

    #[test]
    fn test_insert_and_remove() {
        let mut listeners = Listeners::new();
        let a = next_subscription_id();
        let b = next_subscription_id();
        assert_ne!(a, b);

        listeners.insert(a, noop_status(), noop_message());
        listeners.insert(b, noop_status(), noop_message());
        assert_eq!(listeners.len(), 2);

        assert!(listeners.remove(a));
        assert!(!listeners.remove(a));
        assert_eq!(listeners.len(), 1);
        assert!(listeners.contains(b));
    }

    #[test]
    fn test_dispatch_reaches_every_listener() {
        let mut listeners = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let id = next_subscription_id();
            let hits = Arc::clone(&hits);
            listeners.insert(
                id,
                noop_status(),
                Arc::new(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }

        let panics = listeners.dispatch(&NotificationMessage::connected("hi"));
        assert_eq!(panics, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dispatch_isolates_panicking_listener() {
        let mut listeners = Listeners::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let first = next_subscription_id();
        listeners.insert(
            first,
            noop_status(),
            Arc::new(|_| panic!("listener bug")),
        );
        let second = next_subscription_id();
        let counter = Arc::clone(&seen);
        listeners.insert(
            second,
            noop_status(),
            Arc::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        let panics = listeners.dispatch(&NotificationMessage::connected("hi"));
        assert_eq!(panics, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_one_targets_single_subscriber() {
        let mut listeners = Listeners::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let a = next_subscription_id();
        let log_a = Arc::clone(&log);
        listeners.insert(
            a,
            Arc::new(move |s| log_a.lock().expect("lock").push(("a", s))),
            noop_message(),
        );
        let b = next_subscription_id();
        let log_b = Arc::clone(&log);
        listeners.insert(
            b,
            Arc::new(move |s| log_b.lock().expect("lock").push(("b", s))),
            noop_message(),
        );

        assert!(listeners.notify_one(b, ConnectionStatus::Connecting));
        listeners.broadcast_status(ConnectionStatus::Connected);

        let log = log.lock().expect("lock");
        assert_eq!(
            *log,
            vec![
                ("b", ConnectionStatus::Connecting),
                ("a", ConnectionStatus::Connected),
                ("b", ConnectionStatus::Connected),
            ]
        );
    }
}
