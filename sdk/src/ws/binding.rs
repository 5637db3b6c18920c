//! Per-component binding to the shared connection.
//!
//! A [`NotificationBinding`] is what a view holds: it subscribes to the
//! [`ConnectionManager`] while enabled, tracks the connection status, marks
//! the cached notification collection stale whenever the server reports a
//! change, and forwards brand-new notifications to an optional callback.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use super::manager::{ConnectionManager, Subscription};
use super::messages::{NotificationData, NotificationMessage};
use super::status::ConnectionStatus;
use crate::cache::{QueryCache, NOTIFICATIONS_KEY};

/// Callback invoked with each newly created notification.
pub type NotificationCallback = Arc<dyn Fn(&NotificationData) + Send + Sync>;

/// Options for a [`NotificationBinding`].
#[derive(Clone)]
pub struct BindingOptions {
    /// Subscribe immediately. Defaults to true.
    pub enabled: bool,

    /// Called for every `new` notification that carries a payload.
    pub on_notification: Option<NotificationCallback>,
}

impl Default for BindingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            on_notification: None,
        }
    }
}

impl std::fmt::Debug for BindingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingOptions")
            .field("enabled", &self.enabled)
            .field("on_notification", &self.on_notification.is_some())
            .finish()
    }
}

impl BindingOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether the binding subscribes.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the new-notification callback.
    #[must_use]
    pub fn with_on_notification<F>(mut self, callback: F) -> Self
    where
        F: Fn(&NotificationData) + Send + Sync + 'static,
    {
        self.on_notification = Some(Arc::new(callback));
        self
    }
}

/// What a view reads from its binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingState {
    /// Connection status.
    pub status: ConnectionStatus,
    /// Shorthand for `status == Connected`.
    pub is_connected: bool,
}

impl From<ConnectionStatus> for BindingState {
    fn from(status: ConnectionStatus) -> Self {
        Self {
            status,
            is_connected: status.is_connected(),
        }
    }
}

struct Attachment {
    subscription: Subscription,
    live: Arc<AtomicBool>,
}

/// A view's handle on the notification stream.
///
/// Unsubscribes when dropped.
pub struct NotificationBinding {
    manager: ConnectionManager,
    cache: Arc<dyn QueryCache>,
    on_notification: Option<NotificationCallback>,
    status: Arc<watch::Sender<ConnectionStatus>>,
    attachment: Option<Attachment>,
}

impl std::fmt::Debug for NotificationBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBinding")
            .field("status", &self.status())
            .field("enabled", &self.is_enabled())
            .finish_non_exhaustive()
    }
}

impl NotificationBinding {
    /// Creates a binding, subscribing right away if `options.enabled`.
    pub fn new(
        manager: ConnectionManager,
        cache: Arc<dyn QueryCache>,
        options: BindingOptions,
    ) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        let mut binding = Self {
            manager,
            cache,
            on_notification: options.on_notification,
            status: Arc::new(status),
            attachment: None,
        };
        if options.enabled {
            binding.attach();
        }
        binding
    }

    /// Returns the last status reported to this binding.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Returns true if the shared connection is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Returns status and connectedness together.
    #[must_use]
    pub fn state(&self) -> BindingState {
        BindingState::from(self.status())
    }

    /// Returns a receiver that observes status changes.
    #[must_use]
    pub fn changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Returns true while subscribed.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.attachment.is_some()
    }

    /// Subscribes or unsubscribes.
    ///
    /// A disabled binding reports `Disconnected`.
    pub fn set_enabled(&mut self, enabled: bool) {
        match (enabled, self.attachment.is_some()) {
            (true, false) => self.attach(),
            (false, true) => self.detach(),
            _ => {}
        }
    }

    /// Returns the manager this binding is attached to.
    #[must_use]
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    fn attach(&mut self) {
        let live = Arc::new(AtomicBool::new(true));

        let status = Arc::clone(&self.status);
        let status_live = Arc::clone(&live);
        let cache = Arc::clone(&self.cache);
        let on_notification = self.on_notification.clone();
        let message_live = Arc::clone(&live);

        self.status.send_replace(self.manager.status());
        let subscription = self.manager.subscribe(
            move |next| {
                if status_live.load(Ordering::Acquire) {
                    status.send_replace(next);
                }
            },
            move |message| {
                if message_live.load(Ordering::Acquire) {
                    handle_message(message, cache.as_ref(), on_notification.as_ref());
                }
            },
        );
        debug!(subscription = %subscription.id(), "notification binding attached");

        self.attachment = Some(Attachment { subscription, live });
    }

    fn detach(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.live.store(false, Ordering::Release);
            debug!(subscription = %attachment.subscription.id(), "notification binding detached");
            attachment.subscription.unsubscribe();
        }
        self.status.send_replace(ConnectionStatus::Disconnected);
    }
}

impl Drop for NotificationBinding {
    fn drop(&mut self) {
        if let Some(attachment) = self.attachment.take() {
            attachment.live.store(false, Ordering::Release);
        }
    }
}

fn handle_message(
    message: &NotificationMessage,
    cache: &dyn QueryCache,
    on_notification: Option<&NotificationCallback>,
) {
    if let NotificationMessage::Connected { message } = message {
        debug!(greeting = %message, "notification stream greeting");
    }
    if !message.invalidates_cache() {
        return;
    }

    debug!("notification collection changed");
    cache.invalidate(NOTIFICATIONS_KEY);
    if let (Some(data), Some(callback)) = (message.new_item(), on_notification) {
        callback(data);
    }
}
