//! Session credential providers.

use std::sync::{Arc, RwLock, PoisonError};

use futures_util::future::{self, BoxFuture};

/// Supplies the access token used to authorize the realtime connection.
///
/// The manager calls [`CredentialProvider::access_token`] exactly once per
/// connection attempt. `None` means "logged out" and leaves the manager
/// disconnected without counting as a failure.
pub trait CredentialProvider: Send + Sync + 'static {
    /// Returns the current access token, if a session exists.
    fn access_token(&self) -> BoxFuture<'_, Option<String>>;
}

/// A fixed token (or a fixed absence of one).
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    /// Creates a provider that always returns `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Creates a provider with no session.
    #[must_use]
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> BoxFuture<'_, Option<String>> {
        Box::pin(future::ready(self.token.clone()))
    }
}

/// A token that can be replaced at login, refresh and logout.
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedCredentials {
    /// Creates an empty (logged out) provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new session token.
    pub fn set(&self, token: impl Into<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    /// Drops the session.
    pub fn clear(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Returns true if a token is present.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl CredentialProvider for SharedCredentials {
    fn access_token(&self) -> BoxFuture<'_, Option<String>> {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Box::pin(future::ready(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials() {
        assert_eq!(
            StaticCredentials::new("tok").access_token().await.as_deref(),
            Some("tok")
        );
        assert!(StaticCredentials::anonymous().access_token().await.is_none());
    }

    #[tokio::test]
    async fn test_shared_credentials_login_logout() {
        let creds = SharedCredentials::new();
        assert!(!creds.is_logged_in());
        assert!(creds.access_token().await.is_none());

        let handle = creds.clone();
        handle.set("fresh");
        assert!(creds.is_logged_in());
        assert_eq!(creds.access_token().await.as_deref(), Some("fresh"));

        handle.clear();
        assert!(creds.access_token().await.is_none());
    }
}
