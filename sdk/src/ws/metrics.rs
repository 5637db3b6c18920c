//! WebSocket metrics tracking.
//!
//! Provides atomic counters for monitoring the notification connection.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for the connection manager.
#[derive(Debug, Default)]
pub struct WsMetrics {
    /// Connection attempts started.
    connect_attempts: AtomicU64,

    /// Connections opened.
    connections_opened: AtomicU64,

    /// Connections closed.
    connections_closed: AtomicU64,

    /// Transport errors.
    transport_errors: AtomicU64,

    /// Frames parsed and dispatched.
    messages_received: AtomicU64,

    /// Frames dropped as malformed.
    messages_malformed: AtomicU64,

    /// Keep-alive frames sent.
    pings_sent: AtomicU64,

    /// Reconnects scheduled.
    reconnects_scheduled: AtomicU64,

    /// Listener panics caught.
    listener_panics: AtomicU64,
}

impl WsMetrics {
    /// Creates a new metrics instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a connection attempt.
    pub fn record_connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection opened.
    pub fn record_connection_opened(&self) {
        self.connections_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a connection closed.
    pub fn record_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a transport error.
    pub fn record_transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dispatched message.
    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a dropped malformed frame.
    pub fn record_message_malformed(&self) {
        self.messages_malformed.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a keep-alive frame.
    pub fn record_ping_sent(&self) {
        self.pings_sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a scheduled reconnect.
    pub fn record_reconnect_scheduled(&self) {
        self.reconnects_scheduled.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` caught listener panics.
    pub fn record_listener_panics(&self, count: u64) {
        if count > 0 {
            self.listener_panics.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of the current metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_opened: self.connections_opened.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_malformed: self.messages_malformed.load(Ordering::Relaxed),
            pings_sent: self.pings_sent.load(Ordering::Relaxed),
            reconnects_scheduled: self.reconnects_scheduled.load(Ordering::Relaxed),
            listener_panics: self.listener_panics.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of connection metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Connection attempts started.
    pub connect_attempts: u64,
    /// Connections opened.
    pub connections_opened: u64,
    /// Connections closed.
    pub connections_closed: u64,
    /// Transport errors.
    pub transport_errors: u64,
    /// Frames parsed and dispatched.
    pub messages_received: u64,
    /// Frames dropped as malformed.
    pub messages_malformed: u64,
    /// Keep-alive frames sent.
    pub pings_sent: u64,
    /// Reconnects scheduled.
    pub reconnects_scheduled: u64,
    /// Listener panics caught.
    pub listener_panics: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = WsMetrics::new();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = WsMetrics::new();

        metrics.record_connect_attempt();
        metrics.record_connection_opened();
        metrics.record_message_received();
        metrics.record_message_received();
        metrics.record_message_malformed();
        metrics.record_ping_sent();
        metrics.record_connection_closed();
        metrics.record_transport_error();
        metrics.record_reconnect_scheduled();
        metrics.record_listener_panics(0);
        metrics.record_listener_panics(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.connect_attempts, 1);
        assert_eq!(snapshot.connections_opened, 1);
        assert_eq!(snapshot.messages_received, 2);
        assert_eq!(snapshot.messages_malformed, 1);
        assert_eq!(snapshot.pings_sent, 1);
        assert_eq!(snapshot.connections_closed, 1);
        assert_eq!(snapshot.transport_errors, 1);
        assert_eq!(snapshot.reconnects_scheduled, 1);
        assert_eq!(snapshot.listener_panics, 2);
    }
}
