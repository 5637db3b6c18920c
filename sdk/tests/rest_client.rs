//! REST client tests against a local HTTP server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use slate_sdk::client::{ClientConfig, ClientError, NotificationsClient};

#[derive(Clone, Default)]
struct ServerState {
    stats_calls: Arc<AtomicUsize>,
    rate_limit_first: bool,
}

fn notification(id: &str, is_read: bool) -> Value {
    json!({
        "id": id,
        "title": "Invoice approved",
        "message": "INV-204 was approved",
        "type": "success",
        "is_read": is_read,
        "created_at": "2026-04-02T10:15:00Z",
    })
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "Bearer tok-rest")
}

async fn list(
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let mut items = vec![notification("n-1", false), notification("n-2", true)];
    if params.get("unread_only").map(String::as_str) == Some("true") {
        items.retain(|item| item["is_read"] == json!(false));
    }
    if let Some(limit) = params.get("limit").and_then(|l| l.parse::<usize>().ok()) {
        items.truncate(limit);
    }
    Json(json!({ "notifications": items })).into_response()
}

async fn stats(State(state): State<ServerState>) -> Response {
    let call = state.stats_calls.fetch_add(1, Ordering::SeqCst);
    if state.rate_limit_first && call == 0 {
        return (StatusCode::TOO_MANY_REQUESTS, [("Retry-After", "0")]).into_response();
    }
    Json(json!({ "total": 2, "unread": 1, "by_type": { "success": 2 } })).into_response()
}

async fn mark_read(Path(id): Path<String>) -> Response {
    if id != "n-1" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": { "code": "NOT_FOUND", "message": "no such notification" } })),
        )
            .into_response();
    }
    Json(json!({ "notification": notification("n-1", true) })).into_response()
}

async fn read_all() -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "error": { "code": "READ_ONLY", "message": "account is suspended" } })),
    )
        .into_response()
}

async fn start(state: ServerState) -> String {
    let app = Router::new()
        .route("/api/notifications", get(list))
        .route("/api/notifications/stats", get(stats))
        .route("/api/notifications/read-all", post(read_all))
        .route("/api/notifications/{id}/read", post(mark_read))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });
    format!("http://{addr}")
}

fn client(base_url: &str) -> NotificationsClient {
    NotificationsClient::new(
        ClientConfig::new(base_url)
            .with_access_token("tok-rest")
            .with_timeout(Duration::from_secs(5)),
    )
    .expect("client")
}

#[tokio::test]
async fn test_list_notifications_filters() {
    let base = start(ServerState::default()).await;
    let client = client(&base);

    let all = client.list_notifications(None, false).await.expect("list");
    assert_eq!(all.len(), 2);

    let unread = client.list_notifications(Some(10), true).await.expect("list");
    assert_eq!(unread.len(), 1);
    assert_eq!(unread.first().map(|n| n.id.as_str()), Some("n-1"));

    let limited = client.list_notifications(Some(1), false).await.expect("list");
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let base = start(ServerState::default()).await;
    let anonymous = NotificationsClient::with_base_url(&base).expect("client");

    let err = anonymous
        .list_notifications(None, false)
        .await
        .expect_err("unauthorized");
    assert!(matches!(err, ClientError::Unauthorized));
}

#[tokio::test]
async fn test_stats_retries_after_rate_limit() {
    let state = ServerState {
        rate_limit_first: true,
        ..ServerState::default()
    };
    let calls = Arc::clone(&state.stats_calls);
    let base = start(state).await;

    let stats = client(&base).notification_stats().await.expect("stats");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.unread, 1);
    assert_eq!(stats.by_type.get("success"), Some(&2));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_rate_limit_without_retries() {
    let state = ServerState {
        rate_limit_first: true,
        ..ServerState::default()
    };
    let base = start(state).await;
    let client = NotificationsClient::new(
        ClientConfig::new(&base)
            .with_access_token("tok-rest")
            .with_max_retries(0),
    )
    .expect("client");

    let err = client.notification_stats().await.expect_err("rate limited");
    assert!(matches!(
        err,
        ClientError::RateLimited {
            retry_after: Some(0)
        }
    ));
}

#[tokio::test]
async fn test_mark_read() {
    let base = start(ServerState::default()).await;
    let client = client(&base);

    let updated = client.mark_read("n-1").await.expect("mark read");
    assert!(updated.is_read);

    let err = client.mark_read("n-404").await.expect_err("missing");
    assert!(matches!(err, ClientError::NotFound(path) if path.ends_with("/n-404/read")));
}

#[tokio::test]
async fn test_api_error_body_is_surfaced() {
    let base = start(ServerState::default()).await;

    let err = client(&base).mark_all_read().await.expect_err("api error");
    match err {
        ClientError::Api { code, message } => {
            assert_eq!(code, "READ_ONLY");
            assert_eq!(message, "account is suspended");
        }
        other => panic!("unexpected error: {other}"),
    }
}
