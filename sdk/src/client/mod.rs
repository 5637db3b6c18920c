//! HTTP client for the Slate notification REST API.
//!
//! # Example
//!
//! ```rust,ignore
//! use slate_sdk::client::{ClientConfig, NotificationsClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = NotificationsClient::new(
//!         ClientConfig::new("https://api.slate.example").with_access_token("token"),
//!     )?;
//!
//!     let stats = client.notification_stats().await?;
//!     println!("{} unread of {}", stats.unread, stats.total);
//!
//!     for item in client.list_notifications(Some(10), true).await? {
//!         println!("{}: {}", item.title, item.message);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod types;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::NotificationsClient;
pub use types::{ListQuery, NotificationStats};
