//! Realtime notification stream.
//!
//! A single [`ConnectionManager`] multiplexes one authenticated WebSocket
//! connection across every interested component. Components hold a
//! [`NotificationBinding`] (or a raw [`Subscription`]) and are told about
//! status changes and server messages.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use slate_sdk::cache::InvalidationBus;
//! use slate_sdk::ws::{BindingOptions, ConnectionManager, NotificationBinding, StaticCredentials, WsConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let manager = ConnectionManager::shared(
//!         WsConfig::new("https://api.slate.example"),
//!         Arc::new(StaticCredentials::new("token")),
//!     )?;
//!
//!     let cache = Arc::new(InvalidationBus::default());
//!     let binding = NotificationBinding::new(
//!         manager,
//!         cache,
//!         BindingOptions::new().with_on_notification(|n| println!("{}", n.title)),
//!     );
//!
//!     println!("status: {}", binding.status());
//!     Ok(())
//! }
//! ```

pub mod backoff;
pub mod binding;
pub mod config;
pub mod credentials;
pub mod error;
pub mod listeners;
pub mod manager;
pub mod messages;
pub mod metrics;
pub mod registry;
pub mod status;
pub mod transport;
pub mod visibility;

pub use backoff::ReconnectPolicy;
pub use binding::{BindingOptions, BindingState, NotificationBinding, NotificationCallback};
pub use config::WsConfig;
pub use credentials::{CredentialProvider, SharedCredentials, StaticCredentials};
pub use error::WsError;
pub use listeners::SubscriptionId;
pub use manager::{ConnectionManager, ManagerSnapshot, Subscription};
pub use messages::{NotificationAction, NotificationData, NotificationKind, NotificationMessage};
pub use metrics::{MetricsSnapshot, WsMetrics};
pub use status::ConnectionStatus;
pub use transport::{Link, MemoryPeer, MemoryTransport, Transport, TungsteniteTransport};
pub use visibility::Visibility;
