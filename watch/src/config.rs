//! Watcher configuration.
//!
//! Loaded from `SLATE_*` environment variables, with defaults for everything
//! but the access token.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use slate_sdk::client::ClientConfig;
use slate_sdk::ws::config::{
    DEFAULT_API_URL, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_PING_INTERVAL_SECS,
};
use slate_sdk::ws::WsConfig;

/// Backend base URL.
pub const ENV_API_URL: &str = "SLATE_API_URL";
/// Bearer token of the signed-in user.
pub const ENV_ACCESS_TOKEN: &str = "SLATE_ACCESS_TOKEN";
/// Seconds between REST polls while live updates are unavailable.
pub const ENV_POLL_INTERVAL_SECS: &str = "SLATE_POLL_INTERVAL_SECS";
/// Seconds between keep-alive frames.
pub const ENV_PING_INTERVAL_SECS: &str = "SLATE_PING_INTERVAL_SECS";
/// Reconnect attempt cap.
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "SLATE_MAX_RECONNECT_ATTEMPTS";

/// Default REST poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Configuration for the watcher.
#[derive(Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Backend base URL.
    pub api_url: String,

    /// Bearer token. `None` means logged out.
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Poll interval in seconds.
    pub poll_interval_secs: u64,

    /// Keep-alive interval in seconds.
    pub ping_interval_secs: u64,

    /// Reconnect attempt cap.
    pub max_reconnect_attempts: u32,
}

impl std::fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchConfig")
            .field("api_url", &self.api_url)
            .field("logged_in", &self.access_token.is_some())
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("ping_interval_secs", &self.ping_interval_secs)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .finish()
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            access_token: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl WatchConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads the configuration from `lookup`, which maps a variable name to
    /// its value.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            api_url: lookup(ENV_API_URL).unwrap_or(defaults.api_url),
            access_token: lookup(ENV_ACCESS_TOKEN).filter(|token| !token.trim().is_empty()),
            poll_interval_secs: parse_var(&lookup, ENV_POLL_INTERVAL_SECS)?
                .unwrap_or(defaults.poll_interval_secs),
            ping_interval_secs: parse_var(&lookup, ENV_PING_INTERVAL_SECS)?
                .unwrap_or(defaults.ping_interval_secs),
            max_reconnect_attempts: parse_var(&lookup, ENV_MAX_RECONNECT_ATTEMPTS)?
                .unwrap_or(defaults.max_reconnect_attempts),
        };
        config.validate()?;
        Ok(config)
    }

    /// Sets the backend URL.
    #[must_use]
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    /// Sets the access token.
    #[must_use]
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    /// Returns the poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::InvalidApiUrl(self.api_url.clone()));
        }

        if self.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidPollInterval);
        }

        if self.ping_interval_secs == 0 {
            return Err(ConfigError::InvalidPingInterval);
        }

        Ok(())
    }

    /// Returns the realtime stream configuration.
    #[must_use]
    pub fn ws_config(&self) -> WsConfig {
        WsConfig::new(&self.api_url)
            .with_ping_interval(Duration::from_secs(self.ping_interval_secs))
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
    }

    /// Returns the REST client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.api_url)
            .with_user_agent(format!("slate-watch/{}", env!("CARGO_PKG_VERSION")));
        match &self.access_token {
            Some(token) => config.with_access_token(token),
            None => config,
        }
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(var)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber { var, value })
        })
        .transpose()
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A numeric variable did not parse.
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },

    /// Backend URL is not http(s).
    #[error("api url must start with http:// or https://, got {0:?}")]
    InvalidApiUrl(String),

    /// Invalid poll interval.
    #[error("poll interval must be > 0")]
    InvalidPollInterval,

    /// Invalid ping interval.
    #[error("ping interval must be > 0")]
    InvalidPingInterval,
}
