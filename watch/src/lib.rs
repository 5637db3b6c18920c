//! Slate Watch - terminal watcher for Slate notifications.
//!
//! Subscribes to the realtime notification stream, logs new notifications
//! and keeps the unread counters fresh. While live updates are unavailable
//! it polls the REST API instead.
//!
//! # Components
//!
//! - [`config`]: Watcher configuration from the environment
//! - [`service`]: Watcher loop
//! - [`metrics`]: Watcher metrics

pub mod config;
pub mod metrics;
pub mod service;

pub use config::{ConfigError, WatchConfig};
pub use metrics::WatchMetrics;
pub use service::{WatchError, WatchService};
