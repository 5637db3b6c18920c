//! Client configuration.
//!
//! Provides configuration options for the REST notification client.

use std::time::Duration;

use crate::ws::config::DEFAULT_API_URL;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default maximum retries.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Client configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the backend.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum number of retries for rate-limited or timed-out requests.
    pub max_retries: u32,

    /// Bearer token of the signed-in user.
    pub access_token: Option<String>,

    /// User agent string.
    pub user_agent: String,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            access_token: None,
            user_agent: format!("slate-sdk/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration with the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the bearer token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), super::error::ClientError> {
        if self.base_url.is_empty() {
            return Err(super::error::ClientError::InvalidConfig(
                "base_url cannot be empty".to_string(),
            ));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(super::error::ClientError::InvalidConfig(
                "base_url must start with http:// or https://".to_string(),
            ));
        }

        if self.access_token.as_deref().is_some_and(str::is_empty) {
            return Err(super::error::ClientError::InvalidConfig(
                "access_token cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_API_URL);
        assert_eq!(config.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.access_token.is_none());
        assert!(config.user_agent.starts_with("slate-sdk/"));
    }

    #[test]
    fn test_config_builder() {
        let config = ClientConfig::new("https://api.slate.example")
            .with_timeout(Duration::from_secs(60))
            .with_max_retries(5)
            .with_access_token("tok")
            .with_user_agent("slate-watch/1.0");

        assert_eq!(config.base_url, "https://api.slate.example");
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.access_token.as_deref(), Some("tok"));
        assert_eq!(config.user_agent, "slate-watch/1.0");
    }

    #[test]
    fn test_config_debug_redacts_token() {
        let config = ClientConfig::default().with_access_token("secret-token");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_config_validate() {
        assert!(ClientConfig::new("https://api.slate.example").validate().is_ok());
        assert!(ClientConfig::new("").validate().is_err());
        assert!(ClientConfig::new("ftp://api.slate.example").validate().is_err());
        assert!(ClientConfig::default()
            .with_access_token("")
            .validate()
            .is_err());
    }
}
