//! WebSocket message types.
//!
//! Defines the frames exchanged on the notification stream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Literal keep-alive frame sent by the client.
pub const PING_FRAME: &str = "ping";

/// What happened to the notification collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    /// A notification was created; the message carries its payload.
    New,
    /// The collection changed in a way that requires a refetch.
    Refresh,
    /// A notification was deleted.
    Deleted,
    /// A notification was marked as read.
    Read,
    /// Any action this client does not know about.
    #[serde(other)]
    Other,
}

/// Display hint for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NotificationKind {
    /// Neutral information.
    #[default]
    Info,
    /// Something completed.
    Success,
    /// Needs attention.
    Warning,
    /// Something failed.
    Error,
}

impl NotificationKind {
    /// Maps a wire value to a kind. Unknown values fall back to `Info`.
    #[must_use]
    pub fn from_wire(value: &str) -> Self {
        match value {
            "success" => Self::Success,
            "warning" => Self::Warning,
            "error" => Self::Error,
            _ => Self::Info,
        }
    }

    /// Returns the wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A notification as pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationData {
    /// Notification ID.
    pub id: String,
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Display hint, unconstrained on the wire. See [`Self::kind`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Whether the user has read it.
    pub is_read: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Free-form metadata (project, invoice, kit references and so on).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NotificationData {
    /// Returns the display hint, falling back to `Info` for unknown values.
    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        NotificationKind::from_wire(&self.kind)
    }
}

/// Server-to-client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationMessage {
    /// Handshake acknowledgement. Informational only.
    Connected {
        /// Server greeting.
        #[serde(default)]
        message: String,
    },
    /// The notification collection changed.
    Notification {
        /// What changed.
        action: NotificationAction,
        /// Payload, present for `new`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<NotificationData>,
    },
    /// Any message type this client does not know about.
    #[serde(other)]
    Unknown,
}

impl NotificationMessage {
    /// Creates a handshake message.
    #[must_use]
    pub fn connected(message: impl Into<String>) -> Self {
        Self::Connected {
            message: message.into(),
        }
    }

    /// Creates a `new` notification message.
    #[must_use]
    pub fn new_notification(data: NotificationData) -> Self {
        Self::Notification {
            action: NotificationAction::New,
            data: Some(data),
        }
    }

    /// Creates a payload-less notification message.
    #[must_use]
    pub fn action(action: NotificationAction) -> Self {
        Self::Notification { action, data: None }
    }

    /// Returns true if cached notification state must be refetched.
    #[must_use]
    pub const fn invalidates_cache(&self) -> bool {
        matches!(self, Self::Notification { .. })
    }

    /// Returns the payload of a `new` notification.
    #[must_use]
    pub fn new_item(&self) -> Option<&NotificationData> {
        match self {
            Self::Notification {
                action: NotificationAction::New,
                data: Some(data),
            } => Some(data),
            _ => None,
        }
    }
}

/// Parses an inbound text frame.
///
/// Returns `None` for anything that is not a well-formed message; such
/// frames are dropped without affecting the connection.
#[must_use]
pub fn parse_frame(text: &str) -> Option<NotificationMessage> {
    serde_json::from_str(text).ok()
}
