//! HTTP client implementation.
//!
//! Talks to the notification endpoints the realtime stream points at: when
//! a cache entry is invalidated, views refetch through this client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, warn};

use super::config::ClientConfig;
use super::error::ClientError;
use super::types::{
    ListQuery, MarkAllReadResponse, NotificationResponse, NotificationStats,
    NotificationsResponse,
};
use crate::ws::messages::NotificationData;

/// Path of the notification collection.
pub const NOTIFICATIONS_PATH: &str = "/api/notifications";

/// API error response format.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

/// API error details.
#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    message: String,
}

/// HTTP client for the notification REST API.
#[derive(Debug, Clone)]
pub struct NotificationsClient {
    config: ClientConfig,
    base_url: Url,
    http: reqwest::Client,
}

impl NotificationsClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| ClientError::InvalidConfig(format!("base_url: {e}")))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref token) = config.access_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                ClientError::InvalidConfig("access_token is not a valid header".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            config,
            base_url,
            http,
        })
    }

    /// Creates a new client with the given base URL and no credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str, query: &[(&'static str, String)]) -> Url {
        let mut url = self.base_url.clone();
        let base_path = url.path().trim_end_matches('/').to_string();
        url.set_path(&format!("{base_path}{path}"));
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, method: Method, url: Url) -> Result<T, ClientError> {
        self.request_with_retry(|| self.http.request(method.clone(), url.clone()))
            .await
    }

    /// Makes a request with retry logic.
    async fn request_with_retry<T, F>(&self, request_fn: F) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        F: Fn() -> reqwest::RequestBuilder,
    {
        let mut last_error = None;
        let mut retry_count = 0;

        while retry_count <= self.config.max_retries {
            let response = request_fn().send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();

                    if status.is_success() {
                        let body = resp
                            .text()
                            .await
                            .map_err(|e| ClientError::Deserialization(e.to_string()))?;

                        return serde_json::from_str(&body)
                            .map_err(|e| ClientError::Deserialization(e.to_string()));
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse().ok());

                        if retry_count < self.config.max_retries {
                            let wait_time = retry_after.unwrap_or(1);
                            debug!(wait_time, retry_count, "rate limited, backing off");
                            tokio::time::sleep(Duration::from_secs(wait_time)).await;
                            retry_count += 1;
                            continue;
                        }

                        return Err(ClientError::RateLimited { retry_after });
                    }

                    if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(ClientError::NotFound(resp.url().path().to_string()));
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ClientError::Unauthorized);
                    }

                    let body = resp.text().await.unwrap_or_default();
                    if let Ok(error_resp) = serde_json::from_str::<ApiErrorResponse>(&body) {
                        return Err(ClientError::Api {
                            code: error_resp.error.code,
                            message: error_resp.error.message,
                        });
                    }

                    return Err(ClientError::Api {
                        code: status.as_str().to_string(),
                        message: body,
                    });
                }
                Err(e) => {
                    if e.is_timeout() && retry_count < self.config.max_retries {
                        retry_count += 1;
                        warn!(retry_count, "request timed out, retrying");
                        tokio::time::sleep(Duration::from_millis(100 * (1 << retry_count))).await;
                        last_error = Some(ClientError::from(e));
                        continue;
                    }
                    return Err(ClientError::from(e));
                }
            }
        }

        Err(last_error.unwrap_or(ClientError::Timeout))
    }

    /// Lists the user's notifications, newest first.
    ///
    /// # Arguments
    ///
    /// * `limit` - Optional maximum number of items
    /// * `unread_only` - Only return unread notifications
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_notifications(
        &self,
        limit: Option<u32>,
        unread_only: bool,
    ) -> Result<Vec<NotificationData>, ClientError> {
        let query = ListQuery { limit, unread_only };
        let url = self.url(NOTIFICATIONS_PATH, &query.pairs());
        let response: NotificationsResponse = self.send(Method::GET, url).await?;
        Ok(response.notifications)
    }

    /// Gets total and unread counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn notification_stats(&self) -> Result<NotificationStats, ClientError> {
        let url = self.url(&format!("{NOTIFICATIONS_PATH}/stats"), &[]);
        self.send(Method::GET, url).await
    }

    /// Marks one notification as read and returns it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the notification does not
    /// exist.
    pub async fn mark_read(&self, id: &str) -> Result<NotificationData, ClientError> {
        let url = self.url(&format!("{NOTIFICATIONS_PATH}/{id}/read"), &[]);
        let response: NotificationResponse = self.send(Method::POST, url).await?;
        Ok(response.notification)
    }

    /// Marks every notification as read and returns how many changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn mark_all_read(&self) -> Result<u64, ClientError> {
        let url = self.url(&format!("{NOTIFICATIONS_PATH}/read-all"), &[]);
        let response: MarkAllReadResponse = self.send(Method::POST, url).await?;
        Ok(response.updated)
    }
}
