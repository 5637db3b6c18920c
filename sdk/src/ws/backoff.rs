//! Reconnect backoff policy.

use std::time::Duration;

use super::config::WsConfig;

/// Exponential reconnect policy with a delay ceiling and an attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect.
    pub base_delay: Duration,

    /// Upper bound on any delay.
    pub max_delay: Duration,

    /// Attempts allowed before automatic reconnection stops.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&WsConfig::default())
    }
}

impl ReconnectPolicy {
    /// Builds the policy from a WebSocket configuration.
    #[must_use]
    pub fn from_config(config: &WsConfig) -> Self {
        Self {
            base_delay: config.reconnect_delay,
            max_delay: config.max_reconnect_delay,
            max_attempts: config.max_reconnect_attempts,
        }
    }

    /// Delay for attempt index `attempt`: `min(base * 2^attempt, max)`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }

    /// Returns true while another automatic attempt may be scheduled.
    #[must_use]
    pub const fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}
