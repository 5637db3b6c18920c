//! REST response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ws::messages::NotificationData;

/// Aggregate counts shown by the notification bell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    /// All notifications of the user.
    pub total: u64,
    /// Notifications not yet read.
    pub unread: u64,
    /// Counts per notification type.
    #[serde(default)]
    pub by_type: BTreeMap<String, u64>,
}

/// Query of the notification list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Maximum number of items.
    pub limit: Option<u32>,
    /// Only return unread notifications.
    pub unread_only: bool,
}

impl ListQuery {
    /// Returns the query string pairs.
    #[must_use]
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if self.unread_only {
            pairs.push(("unread_only", "true".to_string()));
        }
        pairs
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationsResponse {
    pub notifications: Vec<NotificationData>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct NotificationResponse {
    pub notification: NotificationData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MarkAllReadResponse {
    pub updated: u64,
}
