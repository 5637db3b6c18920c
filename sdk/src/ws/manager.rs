//! Shared notification connection manager.
//!
//! One [`ConnectionManager`] owns at most one realtime connection, no matter
//! how many subscribers want notification updates. All state lives in a
//! single event-loop task: subscriptions, socket events, timers and
//! visibility changes are queued as events and handled one at a time, so
//! every transition runs to completion without locking.
//!
//! The first subscriber opens the connection and the last one closes it.
//! Closed connections are retried with exponential backoff while anyone is
//! still subscribed, up to the configured attempt cap.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::backoff::ReconnectPolicy;
use super::config::{redact_token, WsConfig};
use super::credentials::CredentialProvider;
use super::error::WsError;
use super::listeners::{
    next_subscription_id, Listeners, MessageListener, StatusListener, SubscriptionId,
};
use super::messages::{parse_frame, NotificationMessage, PING_FRAME};
use super::metrics::WsMetrics;
use super::registry::{self, NOTIFICATIONS_SLOT};
use super::status::ConnectionStatus;
use super::transport::{Link, Transport, TungsteniteTransport};
use super::visibility::Visibility;

/// Point-in-time view of the manager state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManagerSnapshot {
    /// Current connection status.
    pub status: ConnectionStatus,

    /// Active subscriptions.
    pub subscribers: usize,

    /// Consecutive reconnect attempts since the last successful open.
    pub reconnect_attempts: u32,

    /// Whether a reconnect timer is pending.
    pub reconnect_pending: bool,

    /// Whether the keep-alive timer is running.
    pub keepalive_active: bool,

    /// Whether a socket is open or opening.
    pub socket_active: bool,
}

enum Event {
    Subscribe {
        id: SubscriptionId,
        on_status: StatusListener,
        on_message: MessageListener,
    },
    Unsubscribe {
        id: SubscriptionId,
    },
    Visibility(Visibility),
    Unauthenticated {
        generation: u64,
    },
    Opened {
        generation: u64,
    },
    Frame {
        generation: u64,
        text: String,
    },
    TransportError {
        generation: u64,
        error: WsError,
    },
    Closed {
        generation: u64,
    },
    ReconnectDue {
        timer: u64,
    },
}

enum Outbound {
    Text(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SocketPhase {
    Connecting,
    Open,
}

struct Socket {
    generation: u64,
    phase: SocketPhase,
    commands: mpsc::UnboundedSender<Outbound>,
    task: JoinHandle<()>,
}

struct Timer {
    id: u64,
    handle: JoinHandle<()>,
}

/// Handle to a shared notification connection.
///
/// Cloning is cheap; every clone talks to the same event loop.
#[derive(Debug, Clone)]
pub struct ConnectionManager {
    events: mpsc::UnboundedSender<Event>,
    snapshot: watch::Receiver<ManagerSnapshot>,
    metrics: Arc<WsMetrics>,
    config: Arc<WsConfig>,
}

impl std::fmt::Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscribe { id, .. } => write!(f, "Subscribe({id})"),
            Self::Unsubscribe { id } => write!(f, "Unsubscribe({id})"),
            Self::Visibility(v) => write!(f, "Visibility({v:?})"),
            Self::Unauthenticated { generation } => write!(f, "Unauthenticated({generation})"),
            Self::Opened { generation } => write!(f, "Opened({generation})"),
            Self::Frame { generation, .. } => write!(f, "Frame({generation})"),
            Self::TransportError { generation, error } => {
                write!(f, "TransportError({generation}, {error})")
            }
            Self::Closed { generation } => write!(f, "Closed({generation})"),
            Self::ReconnectDue { timer } => write!(f, "ReconnectDue({timer})"),
        }
    }
}

impl ConnectionManager {
    /// Creates a manager using the WebSocket transport.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or there is no
    /// runtime to host the event loop.
    pub fn new(
        config: WsConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, WsError> {
        Self::with_transport(config, credentials, Arc::new(TungsteniteTransport))
    }

    /// Creates a manager using a custom transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or there is no
    /// runtime to host the event loop.
    pub fn with_transport(
        config: WsConfig,
        credentials: Arc<dyn CredentialProvider>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, WsError> {
        config.validate()?;
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|e| WsError::Runtime(e.to_string()))?;

        let config = Arc::new(config);
        let metrics = Arc::new(WsMetrics::new());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(ManagerSnapshot::default());

        let event_loop = EventLoop {
            policy: ReconnectPolicy::from_config(&config),
            config: Arc::clone(&config),
            credentials,
            transport,
            events: events_tx.downgrade(),
            metrics: Arc::clone(&metrics),
            snapshot: snapshot_tx,
            status: ConnectionStatus::Disconnected,
            listeners: Listeners::new(),
            reconnect_attempts: 0,
            generation: 0,
            socket: None,
            reconnect_timer: None,
            next_timer: 0,
            ping_timer: None,
        };
        runtime.spawn(event_loop.run(events_rx));

        Ok(Self {
            events: events_tx,
            snapshot: snapshot_rx,
            metrics,
            config,
        })
    }

    /// Returns the process-wide notifications manager, creating it on first
    /// use.
    ///
    /// Later calls ignore `config` and `credentials` and hand back the
    /// existing instance, so independent bindings share one connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has to be created and creation fails.
    pub fn shared(
        config: WsConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, WsError> {
        registry::get_or_try_init(NOTIFICATIONS_SLOT, || Self::new(config, credentials))
    }

    /// Registers a subscriber.
    ///
    /// `on_status` first receives the current status, before any event that
    /// happens after this call, and then every transition. `on_message`
    /// receives every parsed inbound message from then on. The first
    /// subscriber opens the connection.
    ///
    /// Listeners run on the manager task and must not block. Dropping the
    /// returned [`Subscription`] unsubscribes.
    pub fn subscribe<S, M>(&self, on_status: S, on_message: M) -> Subscription
    where
        S: Fn(ConnectionStatus) + Send + Sync + 'static,
        M: Fn(&NotificationMessage) + Send + Sync + 'static,
    {
        let id = next_subscription_id();
        let _ = self.events.send(Event::Subscribe {
            id,
            on_status: Arc::new(on_status),
            on_message: Arc::new(on_message),
        });

        Subscription {
            id,
            events: self.events.clone(),
            active: AtomicBool::new(true),
        }
    }

    /// Reports a visibility change of the host surface.
    pub fn notify_visibility(&self, visibility: Visibility) {
        let _ = self.events.send(Event::Visibility(visibility));
    }

    /// Forwards every item of `changes` to [`Self::notify_visibility`].
    pub fn watch_visibility<S>(&self, changes: S) -> JoinHandle<()>
    where
        S: Stream<Item = Visibility> + Send + 'static,
    {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut changes = Box::pin(changes);
            while let Some(visibility) = changes.next().await {
                manager.notify_visibility(visibility);
            }
        })
    }

    /// Returns the latest published state.
    #[must_use]
    pub fn snapshot(&self) -> ManagerSnapshot {
        *self.snapshot.borrow()
    }

    /// Returns the current connection status.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.snapshot().status
    }

    /// Returns the number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.snapshot().subscribers
    }

    /// Returns a receiver that observes every published state.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ManagerSnapshot> {
        self.snapshot.clone()
    }

    /// Waits until the published state satisfies `predicate`.
    ///
    /// Returns the last known state if the event loop has stopped.
    pub async fn wait_until<F>(&self, mut predicate: F) -> ManagerSnapshot
    where
        F: FnMut(&ManagerSnapshot) -> bool,
    {
        let mut rx = self.snapshot.clone();
        let result = rx.wait_for(|snapshot| predicate(snapshot)).await.map(|s| *s);
        result.unwrap_or_else(|_| *rx.borrow())
    }

    /// Returns the connection metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<WsMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Returns the manager configuration.
    #[must_use]
    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    /// Returns true while the event loop is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }
}

/// An active subscription.
///
/// Unsubscribes when dropped. [`Subscription::unsubscribe`] may be called
/// any number of times; only the first call has an effect.
#[derive(Debug)]
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    events: mpsc::UnboundedSender<Event>,
    active: AtomicBool,
}

impl Subscription {
    /// Returns the subscription ID.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns true until the subscription is cancelled.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Cancels the subscription. The last subscriber closes the connection.
    pub fn unsubscribe(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            let _ = self.events.send(Event::Unsubscribe { id: self.id });
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

struct EventLoop {
    config: Arc<WsConfig>,
    policy: ReconnectPolicy,
    credentials: Arc<dyn CredentialProvider>,
    transport: Arc<dyn Transport>,
    events: mpsc::WeakUnboundedSender<Event>,
    metrics: Arc<WsMetrics>,
    snapshot: watch::Sender<ManagerSnapshot>,
    status: ConnectionStatus,
    listeners: Listeners,
    reconnect_attempts: u32,
    generation: u64,
    socket: Option<Socket>,
    reconnect_timer: Option<Timer>,
    next_timer: u64,
    ping_timer: Option<JoinHandle<()>>,
}

impl EventLoop {
    async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        while let Some(event) = events.recv().await {
            self.handle(event);
            self.publish();
        }

        self.disconnect();
        self.publish();
        debug!("notification connection manager stopped");
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Subscribe {
                id,
                on_status,
                on_message,
            } => self.on_subscribe(id, on_status, on_message),
            Event::Unsubscribe { id } => self.on_unsubscribe(id),
            Event::Visibility(visibility) => self.on_visibility(visibility),
            Event::Unauthenticated { generation } => self.on_unauthenticated(generation),
            Event::Opened { generation } => self.on_opened(generation),
            Event::Frame { generation, text } => self.on_frame(generation, &text),
            Event::TransportError { generation, error } => {
                self.on_transport_error(generation, &error);
            }
            Event::Closed { generation } => self.on_closed(generation),
            Event::ReconnectDue { timer } => self.on_reconnect_due(timer),
        }
    }

    fn on_subscribe(
        &mut self,
        id: SubscriptionId,
        on_status: StatusListener,
        on_message: MessageListener,
    ) {
        self.listeners.insert(id, on_status, on_message);
        if !self.listeners.notify_one(id, self.status) {
            self.metrics.record_listener_panics(1);
        }
        debug!(subscription = %id, subscribers = self.listeners.len(), "subscribed");

        if self.listeners.len() == 1 {
            self.reconnect_attempts = 0;
            self.cancel_reconnect();
            self.connect();
        } else if self.is_exhausted() {
            info!("new subscriber, resuming reconnection");
            self.reconnect_attempts = 0;
            self.schedule_reconnect();
        }
    }

    fn on_unsubscribe(&mut self, id: SubscriptionId) {
        if !self.listeners.remove(id) {
            return;
        }
        debug!(subscription = %id, subscribers = self.listeners.len(), "unsubscribed");

        if self.listeners.is_empty() {
            self.disconnect();
        }
    }

    fn on_visibility(&mut self, visibility: Visibility) {
        if !visibility.is_visible()
            || self.listeners.is_empty()
            || !self.status.allows_reconnect()
        {
            return;
        }

        info!(status = %self.status, "became visible, reconnecting now");
        self.reconnect_attempts = 0;
        self.cancel_reconnect();
        self.connect();
    }

    fn on_unauthenticated(&mut self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }

        self.socket = None;
        info!("no session available, notification stream stays disconnected");
        self.set_status(ConnectionStatus::Disconnected);
    }

    fn on_opened(&mut self, generation: u64) {
        let Some(socket) = self
            .socket
            .as_mut()
            .filter(|socket| socket.generation == generation)
        else {
            return;
        };
        socket.phase = SocketPhase::Open;
        let commands = socket.commands.clone();

        self.reconnect_attempts = 0;
        self.metrics.record_connection_opened();
        info!(generation, "notification stream connected");
        self.set_status(ConnectionStatus::Connected);
        self.start_ping(commands);
    }

    fn on_frame(&mut self, generation: u64, text: &str) {
        if !self.is_current(generation) {
            return;
        }

        match parse_frame(text) {
            Some(message) => {
                self.metrics.record_message_received();
                let panics = self.listeners.dispatch(&message);
                self.metrics.record_listener_panics(panics);
            }
            None => {
                self.metrics.record_message_malformed();
                debug!(len = text.len(), "dropping malformed notification frame");
            }
        }
    }

    fn on_transport_error(&mut self, generation: u64, error: &WsError) {
        if !self.is_current(generation) {
            return;
        }

        warn!(%error, "notification stream transport error");
        self.metrics.record_transport_error();
        self.set_status(ConnectionStatus::Error);
    }

    fn on_closed(&mut self, generation: u64) {
        if !self.is_current(generation) {
            return;
        }

        self.socket = None;
        self.stop_ping();
        self.metrics.record_connection_closed();
        debug!(generation, "notification stream closed");
        self.set_status(ConnectionStatus::Disconnected);
        self.schedule_reconnect();
    }

    fn on_reconnect_due(&mut self, timer: u64) {
        if !self
            .reconnect_timer
            .as_ref()
            .is_some_and(|pending| pending.id == timer)
        {
            return;
        }

        self.reconnect_timer = None;
        if !self.listeners.is_empty() {
            self.connect();
        }
    }

    fn connect(&mut self) {
        if self.socket.is_some() {
            debug!("connect skipped, socket already open or opening");
            return;
        }
        let Some(events) = self.events.upgrade() else {
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.metrics.record_connect_attempt();
        self.set_status(ConnectionStatus::Connecting);

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(drive_connection(
            generation,
            Arc::clone(&self.config),
            Arc::clone(&self.credentials),
            Arc::clone(&self.transport),
            events,
            commands_rx,
        ));

        self.socket = Some(Socket {
            generation,
            phase: SocketPhase::Connecting,
            commands,
            task,
        });
    }

    fn disconnect(&mut self) {
        self.cancel_reconnect();
        self.stop_ping();

        if let Some(socket) = self.socket.take() {
            debug!(generation = socket.generation, "closing notification stream");
            match socket.phase {
                SocketPhase::Open => {
                    let _ = socket.commands.send(Outbound::Close);
                }
                SocketPhase::Connecting => socket.task.abort(),
            }
        }

        self.set_status(ConnectionStatus::Disconnected);
    }

    fn schedule_reconnect(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        if !self.policy.should_retry(self.reconnect_attempts) {
            warn!(
                attempts = self.reconnect_attempts,
                "reconnect attempts exhausted, waiting for a new subscriber or visibility change"
            );
            return;
        }
        let Some(events) = self.events.upgrade() else {
            return;
        };

        let delay = self.policy.delay_for(self.reconnect_attempts);
        self.cancel_reconnect();
        self.next_timer += 1;
        let timer = self.next_timer;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::ReconnectDue { timer });
        });
        self.reconnect_timer = Some(Timer { id: timer, handle });
        self.reconnect_attempts += 1;
        self.metrics.record_reconnect_scheduled();

        info!(
            attempt = self.reconnect_attempts,
            ?delay,
            "scheduling reconnect"
        );
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.handle.abort();
        }
    }

    fn start_ping(&mut self, commands: mpsc::UnboundedSender<Outbound>) {
        self.stop_ping();

        let period = self.config.ping_interval;
        let metrics = Arc::clone(&self.metrics);
        self.ping_timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if commands.send(Outbound::Text(PING_FRAME.to_string())).is_err() {
                    break;
                }
                metrics.record_ping_sent();
            }
        }));
    }

    fn stop_ping(&mut self) {
        if let Some(handle) = self.ping_timer.take() {
            handle.abort();
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }

        debug!(from = %self.status, to = %status, "connection status changed");
        self.status = status;
        let panics = self.listeners.broadcast_status(status);
        self.metrics.record_listener_panics(panics);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|socket| socket.generation == generation)
    }

    fn is_exhausted(&self) -> bool {
        self.socket.is_none()
            && self.reconnect_timer.is_none()
            && !self.policy.should_retry(self.reconnect_attempts)
    }

    fn publish(&self) {
        self.snapshot.send_replace(ManagerSnapshot {
            status: self.status,
            subscribers: self.listeners.len(),
            reconnect_attempts: self.reconnect_attempts,
            reconnect_pending: self.reconnect_timer.is_some(),
            keepalive_active: self.ping_timer.is_some(),
            socket_active: self.socket.is_some(),
        });
    }
}

/// Runs one connection attempt from credential lookup to close.
async fn drive_connection(
    generation: u64,
    config: Arc<WsConfig>,
    credentials: Arc<dyn CredentialProvider>,
    transport: Arc<dyn Transport>,
    events: mpsc::UnboundedSender<Event>,
    mut commands: mpsc::UnboundedReceiver<Outbound>,
) {
    let Some(token) = credentials.access_token().await else {
        let _ = events.send(Event::Unauthenticated { generation });
        return;
    };

    let opened = match config.endpoint_url(&token) {
        Ok(url) => {
            debug!(endpoint = %redact_token(&url), "opening notification stream");
            transport.open(url).await
        }
        Err(error) => Err(error),
    };
    let Link {
        mut outbound,
        mut inbound,
    } = match opened {
        Ok(link) => link,
        Err(error) => {
            let _ = events.send(Event::TransportError { generation, error });
            let _ = events.send(Event::Closed { generation });
            return;
        }
    };
    let _ = events.send(Event::Opened { generation });

    loop {
        tokio::select! {
            frame = inbound.next() => match frame {
                Some(Ok(text)) => {
                    let _ = events.send(Event::Frame { generation, text });
                }
                Some(Err(error)) => {
                    let _ = events.send(Event::TransportError { generation, error });
                    break;
                }
                None => break,
            },
            command = commands.recv() => match command {
                Some(Outbound::Text(text)) => {
                    if let Err(error) = outbound.send(text).await {
                        let _ = events.send(Event::TransportError { generation, error });
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = outbound.close().await;
                    break;
                }
            },
        }
    }

    let _ = events.send(Event::Closed { generation });
}
