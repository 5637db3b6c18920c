//! WebSocket error types.
//!
//! These errors never reach subscribers. The connection manager turns every
//! transport failure into a status transition; `WsError` only surfaces from
//! configuration, URL construction and [`Transport`](super::Transport)
//! implementations.

/// WebSocket errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WsError {
    /// Connection could not be established.
    #[error("connection failed: {0}")]
    Connection(String),

    /// WebSocket protocol error on an open connection.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Connection closed.
    #[error("connection closed")]
    Closed,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Backend URL could not be turned into a realtime endpoint.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// No Tokio runtime to host the connection manager.
    #[error("no async runtime: {0}")]
    Runtime(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;

        match err {
            Error::ConnectionClosed | Error::AlreadyClosed => Self::Closed,
            other => Self::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ws_error_display() {
        let err = WsError::Connection("timeout".to_string());
        assert_eq!(err.to_string(), "connection failed: timeout");
    }

    #[test]
    fn test_ws_error_invalid_url() {
        let err = WsError::InvalidUrl("ftp://backend".to_string());
        assert_eq!(err.to_string(), "invalid url: ftp://backend");
    }

    #[test]
    fn test_ws_error_closed() {
        let err = WsError::Closed;
        assert_eq!(err.to_string(), "connection closed");
    }

    #[test]
    fn test_ws_error_from_tungstenite_closed() {
        let err = WsError::from(tokio_tungstenite::tungstenite::Error::ConnectionClosed);
        assert_eq!(err, WsError::Closed);
    }
}
