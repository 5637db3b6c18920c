//! End-to-end tests of the connection manager against a real WebSocket
//! server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use slate_sdk::ws::{
    ConnectionManager, ConnectionStatus, NotificationAction, NotificationMessage,
    StaticCredentials, WsConfig,
};
use tokio::sync::mpsc;
use tokio::time::timeout;

const GREETING: &str = r#"{"type":"connected","message":"Connected to notifications"}"#;
const NEW_FRAME: &str = r#"{"type":"notification","action":"new","data":{"id":"n-1","title":"Scene 12 scheduled","message":"Shooting day 4 was updated","type":"info","is_read":false,"created_at":"2026-05-01T08:00:00Z"}}"#;

const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct ServerState {
    tokens: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedSender<String>,
    closed: mpsc::UnboundedSender<()>,
    hang_up_after_greeting: bool,
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(state): State<ServerState>,
) -> impl IntoResponse {
    if let Some(token) = params.get("token") {
        state.tokens.lock().expect("lock").push(token.clone());
    }
    ws.on_upgrade(move |socket| serve_socket(socket, state))
}

async fn serve_socket(mut socket: WebSocket, state: ServerState) {
    state.connections.fetch_add(1, Ordering::SeqCst);

    if socket.send(Message::Text(GREETING.into())).await.is_err() {
        return;
    }
    if state.hang_up_after_greeting {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }
    if socket.send(Message::Text(NEW_FRAME.into())).await.is_err() {
        return;
    }

    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(text) => {
                let _ = state.received.send(text.to_string());
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    let _ = state.closed.send(());
}

struct TestServer {
    url: String,
    tokens: Arc<Mutex<Vec<String>>>,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedReceiver<String>,
    closed: mpsc::UnboundedReceiver<()>,
}

async fn start_server(hang_up_after_greeting: bool) -> TestServer {
    let (received_tx, received) = mpsc::unbounded_channel();
    let (closed_tx, closed) = mpsc::unbounded_channel();
    let state = ServerState {
        tokens: Arc::new(Mutex::new(Vec::new())),
        connections: Arc::new(AtomicUsize::new(0)),
        received: received_tx,
        closed: closed_tx,
        hang_up_after_greeting,
    };
    let tokens = Arc::clone(&state.tokens);
    let connections = Arc::clone(&state.connections);

    let app = Router::new()
        .route("/ws/notifications", get(ws_handler))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server");
    });

    TestServer {
        url: format!("http://{addr}"),
        tokens,
        connections,
        received,
        closed,
    }
}

#[tokio::test]
async fn test_connects_receives_and_pings() {
    let mut server = start_server(false).await;
    let manager = ConnectionManager::new(
        WsConfig::new(&server.url).with_ping_interval(Duration::from_millis(200)),
        Arc::new(StaticCredentials::new("tok-e2e")),
    )
    .expect("manager");

    let (messages_tx, mut messages) = mpsc::unbounded_channel();
    let subscription = manager.subscribe(
        |_| {},
        move |message| {
            let _ = messages_tx.send(message.clone());
        },
    );

    let snapshot = timeout(WAIT, manager.wait_until(|s| s.status.is_connected()))
        .await
        .expect("connected in time");
    assert_eq!(snapshot.status, ConnectionStatus::Connected);

    let greeting = timeout(WAIT, messages.recv()).await.expect("greeting").expect("message");
    assert!(matches!(greeting, NotificationMessage::Connected { .. }));

    let notification = timeout(WAIT, messages.recv()).await.expect("notification").expect("message");
    assert!(matches!(
        notification,
        NotificationMessage::Notification {
            action: NotificationAction::New,
            ..
        }
    ));
    assert_eq!(notification.new_item().map(|n| n.id.as_str()), Some("n-1"));

    let ping = timeout(WAIT, server.received.recv()).await.expect("ping").expect("frame");
    assert_eq!(ping, "ping");
    assert_eq!(*server.tokens.lock().expect("lock"), vec!["tok-e2e".to_string()]);

    subscription.unsubscribe();
    timeout(WAIT, server.closed.recv()).await.expect("server saw close");
    let snapshot = timeout(WAIT, manager.wait_until(|s| s.subscribers == 0 && !s.socket_active))
        .await
        .expect("idle");
    assert_eq!(snapshot.status, ConnectionStatus::Disconnected);
    assert_eq!(server.connections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_reconnects_after_server_hangs_up() {
    let server = start_server(true).await;
    let manager = ConnectionManager::new(
        WsConfig::new(&server.url).with_reconnect_delay(Duration::from_millis(50)),
        Arc::new(StaticCredentials::new("tok-e2e")),
    )
    .expect("manager");

    let _subscription = manager.subscribe(|_| {}, |_| {});

    timeout(WAIT, async {
        while server.connections.load(Ordering::SeqCst) < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("server saw reconnects");

    assert!(manager.metrics().snapshot().reconnects_scheduled >= 2);
}

#[tokio::test]
async fn test_unreachable_server_reports_error_and_retries() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let manager = ConnectionManager::new(
        WsConfig::new(format!("http://{addr}")).with_reconnect_delay(Duration::from_millis(20)),
        Arc::new(StaticCredentials::new("tok-e2e")),
    )
    .expect("manager");

    let (status_tx, mut statuses) = mpsc::unbounded_channel();
    let _subscription = manager.subscribe(
        move |status| {
            let _ = status_tx.send(status);
        },
        |_| {},
    );

    let mut seen = Vec::new();
    timeout(WAIT, async {
        while let Some(status) = statuses.recv().await {
            seen.push(status);
            if status == ConnectionStatus::Error {
                break;
            }
        }
    })
    .await
    .expect("error status");

    assert_eq!(seen.first(), Some(&ConnectionStatus::Disconnected));
    assert!(seen.contains(&ConnectionStatus::Connecting));
    assert!(!seen.contains(&ConnectionStatus::Connected));

    timeout(WAIT, manager.wait_until(|s| s.reconnect_attempts >= 2))
        .await
        .expect("retrying");
}
