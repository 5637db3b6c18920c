//! Slate SDK - realtime notification delivery for the Slate backend.
//!
//! The crate keeps a single authenticated WebSocket connection to the
//! notification stream open for as long as anything in the process is
//! interested in notifications, and shares it between all interested
//! components.
//!
//! # Modules
//!
//! - [`ws`] — connection manager, per-view bindings and wire messages
//! - [`cache`] — invalidation of cached query results
//! - [`client`] — REST client for the notification endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use slate_sdk::ws::{ConnectionManager, StaticCredentials, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), slate_sdk::WsError> {
//!     let manager = ConnectionManager::shared(
//!         WsConfig::new("http://localhost:8000"),
//!         Arc::new(StaticCredentials::new("token")),
//!     )?;
//!
//!     let _subscription = manager.subscribe(
//!         |status| println!("status: {status}"),
//!         |message| println!("message: {message:?}"),
//!     );
//!     tokio::signal::ctrl_c().await.ok();
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod ws;

pub use cache::{InvalidationBus, QueryCache, NOTIFICATIONS_KEY};
pub use client::{ClientConfig, ClientError, NotificationStats, NotificationsClient};
pub use ws::{
    BindingOptions, ConnectionManager, ConnectionStatus, NotificationBinding, NotificationData,
    NotificationMessage, Subscription, WsConfig, WsError,
};
