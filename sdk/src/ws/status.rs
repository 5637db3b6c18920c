//! Connection status.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status of the shared realtime connection.
///
/// `Disconnected` is both the initial state and the dormant state once the
/// last subscriber leaves. `Error` behaves like `Disconnected` for
/// reconnection purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// An attempt is in flight (credential lookup or handshake).
    Connecting,
    /// The socket is open.
    Connected,
    /// No socket.
    #[default]
    Disconnected,
    /// The transport reported an error.
    Error,
}

impl ConnectionStatus {
    /// Returns true if the socket is open.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Returns true if a visibility change may trigger an immediate connect.
    #[must_use]
    pub const fn allows_reconnect(self) -> bool {
        matches!(self, Self::Disconnected | Self::Error)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connecting" => Ok(Self::Connecting),
            "connected" => Ok(Self::Connected),
            "disconnected" => Ok(Self::Disconnected),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown connection status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_default_is_disconnected() {
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_status_is_connected() {
        assert!(ConnectionStatus::Connected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(!ConnectionStatus::Error.is_connected());
    }

    #[test]
    fn test_status_allows_reconnect() {
        assert!(ConnectionStatus::Disconnected.allows_reconnect());
        assert!(ConnectionStatus::Error.allows_reconnect());
        assert!(!ConnectionStatus::Connecting.allows_reconnect());
        assert!(!ConnectionStatus::Connected.allows_reconnect());
    }

    #[test]
    fn test_status_display_and_parse() {
        for status in [
            ConnectionStatus::Connecting,
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnected,
            ConnectionStatus::Error,
        ] {
            assert_eq!(status.to_string().parse::<ConnectionStatus>(), Ok(status));
        }
        assert!("open".parse::<ConnectionStatus>().is_err());
    }
}
