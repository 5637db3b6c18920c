//! WebSocket configuration.
//!
//! Provides configuration options for the notification connection manager.

use std::time::Duration;

use reqwest::Url;

use super::error::WsError;

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path of the notification stream, relative to the backend base URL.
pub const DEFAULT_NOTIFICATIONS_PATH: &str = "/ws/notifications";

/// Default keep-alive interval in seconds.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 25;

/// Default reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;

/// Maximum reconnect delay in milliseconds.
pub const MAX_RECONNECT_DELAY_MS: u64 = 30_000;

/// Default maximum reconnection attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 10;

/// WebSocket configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Backend HTTP base URL; the realtime scheme is derived from it.
    pub api_url: String,

    /// Notification stream path.
    pub path: String,

    /// Keep-alive interval.
    pub ping_interval: Duration,

    /// Initial reconnect delay.
    pub reconnect_delay: Duration,

    /// Maximum reconnect delay.
    pub max_reconnect_delay: Duration,

    /// Maximum consecutive reconnection attempts.
    pub max_reconnect_attempts: u32,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            path: DEFAULT_NOTIFICATIONS_PATH.to_string(),
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_delay: Duration::from_millis(MAX_RECONNECT_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl WsConfig {
    /// Creates a new configuration for the given backend base URL.
    #[must_use]
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            ..Default::default()
        }
    }

    /// Sets the notification stream path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the keep-alive interval.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the initial reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnect delay.
    #[must_use]
    pub fn with_max_reconnect_delay(mut self, delay: Duration) -> Self {
        self.max_reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Builds the realtime endpoint for `token`.
    ///
    /// `https` maps to `wss` and `http` maps to `ws`. The token is appended
    /// as the `token` query parameter.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not an absolute HTTP(S) URL.
    pub fn endpoint_url(&self, token: &str) -> Result<Url, WsError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| WsError::InvalidUrl(format!("{}: {e}", self.api_url)))?;

        let scheme = match url.scheme() {
            "https" => "wss",
            "http" => "ws",
            other => {
                return Err(WsError::InvalidUrl(format!(
                    "unsupported scheme {other}, expected http or https"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| WsError::InvalidUrl(self.api_url.clone()))?;

        let path = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.path.trim_start_matches('/')
        );
        url.set_path(&path);
        url.set_query(None);
        url.query_pairs_mut().append_pair("token", token);

        Ok(url)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), WsError> {
        if self.api_url.is_empty() {
            return Err(WsError::InvalidConfig("api_url cannot be empty".to_string()));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(WsError::InvalidConfig(
                "api_url must start with http:// or https://".to_string(),
            ));
        }

        if self.ping_interval.is_zero() {
            return Err(WsError::InvalidConfig(
                "ping_interval must be > 0".to_string(),
            ));
        }

        if self.reconnect_delay > self.max_reconnect_delay {
            return Err(WsError::InvalidConfig(
                "reconnect_delay must be <= max_reconnect_delay".to_string(),
            ));
        }

        Ok(())
    }
}

/// Replaces the `token` query parameter so endpoints can be logged.
#[must_use]
pub fn redact_token(url: &Url) -> String {
    let mut redacted = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let value = if k == "token" { "***".to_string() } else { v.into_owned() };
            (k.into_owned(), value)
        })
        .collect();
    redacted.set_query(None);
    if !pairs.is_empty() {
        redacted.query_pairs_mut().extend_pairs(pairs);
    }
    redacted.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = WsConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.ping_interval, Duration::from_secs(25));
        assert_eq!(config.reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_config_builder() {
        let config = WsConfig::new("https://api.example.com")
            .with_path("/realtime")
            .with_ping_interval(Duration::from_secs(60))
            .with_reconnect_delay(Duration::from_secs(2))
            .with_max_reconnect_delay(Duration::from_secs(60))
            .with_max_reconnect_attempts(5);

        assert_eq!(config.api_url, "https://api.example.com");
        assert_eq!(config.path, "/realtime");
        assert_eq!(config.ping_interval, Duration::from_secs(60));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(60));
        assert_eq!(config.max_reconnect_attempts, 5);
    }

    #[test]
    fn test_endpoint_url_secure() {
        let config = WsConfig::new("https://api.example.com");
        let url = config.endpoint_url("abc").expect("endpoint");
        assert_eq!(url.as_str(), "wss://api.example.com/ws/notifications?token=abc");
    }

    #[test]
    fn test_endpoint_url_insecure_with_port() {
        let config = WsConfig::new("http://localhost:8000/");
        let url = config.endpoint_url("abc").expect("endpoint");
        assert_eq!(url.as_str(), "ws://localhost:8000/ws/notifications?token=abc");
    }

    #[test]
    fn test_endpoint_url_keeps_base_path() {
        let config = WsConfig::new("https://example.com/api");
        let url = config.endpoint_url("abc").expect("endpoint");
        assert_eq!(url.as_str(), "wss://example.com/api/ws/notifications?token=abc");
    }

    #[test]
    fn test_endpoint_url_encodes_token() {
        let config = WsConfig::new("https://api.example.com");
        let url = config.endpoint_url("a b&c").expect("endpoint");
        assert_eq!(
            url.as_str(),
            "wss://api.example.com/ws/notifications?token=a+b%26c"
        );
    }

    #[test]
    fn test_endpoint_url_rejects_other_scheme() {
        let config = WsConfig::new("ftp://example.com");
        assert!(matches!(
            config.endpoint_url("abc"),
            Err(WsError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_redact_token() {
        let config = WsConfig::new("https://api.example.com");
        let url = config.endpoint_url("secret").expect("endpoint");
        let redacted = redact_token(&url);
        assert!(!redacted.contains("secret"));
        assert!(redacted.ends_with("token=***") || redacted.ends_with("token=%2A%2A%2A"));
    }

    #[test]
    fn test_config_validate_valid() {
        assert!(WsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validate_empty_url() {
        assert!(WsConfig::new("").validate().is_err());
    }

    #[test]
    fn test_config_validate_invalid_scheme() {
        assert!(WsConfig::new("wss://example.com").validate().is_err());
    }

    #[test]
    fn test_config_validate_delay_order() {
        let config = WsConfig::default()
            .with_reconnect_delay(Duration::from_secs(60))
            .with_max_reconnect_delay(Duration::from_secs(30));
        assert!(config.validate().is_err());
    }
}
