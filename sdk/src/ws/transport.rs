//! Realtime transport seam.
//!
//! The connection manager only sees a [`Link`]: a sink of outbound text
//! frames and a stream of inbound text frames. The stream ending means the
//! socket closed; an `Err` item is a transport error.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::{self, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{Sink, SinkExt, StreamExt};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_tungstenite::tungstenite::Message;

use super::error::WsError;

/// Outbound half of a connection.
pub type OutboundSink = Pin<Box<dyn Sink<String, Error = WsError> + Send>>;

/// Inbound half of a connection.
pub type InboundStream = BoxStream<'static, Result<String, WsError>>;

/// An open realtime connection.
pub struct Link {
    /// Text frames to the server.
    pub outbound: OutboundSink,
    /// Text frames from the server.
    pub inbound: InboundStream,
}

impl std::fmt::Debug for Link {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Link").finish_non_exhaustive()
    }
}

/// Opens realtime connections.
pub trait Transport: Send + Sync + 'static {
    /// Opens a connection to `url`.
    fn open(&self, url: Url) -> BoxFuture<'static, Result<Link, WsError>>;
}

/// WebSocket transport backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

impl Transport for TungsteniteTransport {
    fn open(&self, url: Url) -> BoxFuture<'static, Result<Link, WsError>> {
        Box::pin(async move {
            let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| WsError::Connection(e.to_string()))?;

            let (sink, source) = ws_stream.split();

            let outbound = sink
                .sink_map_err(WsError::from)
                .with(|text: String| future::ready(Ok::<_, WsError>(Message::Text(text.into()))));

            // Control frames are handled by tungstenite; binary frames are not
            // part of the notification protocol.
            let inbound = source.filter_map(|result| {
                future::ready(match result {
                    Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                    Ok(_) => None,
                    Err(e) => Some(Err(WsError::from(e))),
                })
            });

            Ok(Link {
                outbound: Box::pin(outbound),
                inbound: inbound.boxed(),
            })
        })
    }
}

/// Server side of an in-memory connection.
#[derive(Debug)]
pub struct MemoryPeer {
    url: Url,
    to_client: Option<mpsc::UnboundedSender<Result<String, WsError>>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// URL the client connected to.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Sends a text frame to the client. Returns false once closed.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        self.to_client
            .as_ref()
            .is_some_and(|tx| tx.send(Ok(text.into())).is_ok())
    }

    /// Reports a transport error to the client, then closes.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if let Some(tx) = self.to_client.take() {
            let _ = tx.send(Err(WsError::Protocol(reason.into())));
        }
    }

    /// Closes the connection from the server side.
    pub fn close(&mut self) {
        self.to_client = None;
    }

    /// Waits for the next frame sent by the client. `None` once the client
    /// side is gone.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Returns a frame sent by the client, if one is already queued.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

#[derive(Debug)]
struct MemoryState {
    accepted: mpsc::UnboundedSender<MemoryPeer>,
    attempts: Vec<Url>,
}

/// In-memory transport for tests and local tooling.
///
/// Every successful `open` hands a [`MemoryPeer`] to the receiver returned
/// by [`MemoryTransport::new`].
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
    refuse: Arc<AtomicBool>,
    opens: Arc<AtomicUsize>,
}

impl MemoryTransport {
    /// Creates a transport and the receiver of its server-side peers.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (accepted, peers) = mpsc::unbounded_channel();
        let transport = Self {
            state: Arc::new(Mutex::new(MemoryState {
                accepted,
                attempts: Vec::new(),
            })),
            refuse: Arc::new(AtomicBool::new(false)),
            opens: Arc::new(AtomicUsize::new(0)),
        };
        (transport, peers)
    }

    /// Makes subsequent `open` calls fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Number of `open` calls so far.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// URLs of every `open` call so far.
    #[must_use]
    pub fn attempts(&self) -> Vec<Url> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .attempts
            .clone()
    }
}

impl Transport for MemoryTransport {
    fn open(&self, url: Url) -> BoxFuture<'static, Result<Link, WsError>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.attempts.push(url.clone());

        if self.refuse.load(Ordering::SeqCst) {
            return Box::pin(future::ready(Err(WsError::Connection(
                "connection refused".to_string(),
            ))));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound_tx, from_client) = mpsc::unbounded_channel::<String>();
        let peer = MemoryPeer {
            url,
            to_client: Some(to_client),
            from_client,
        };
        let accepted = state.accepted.send(peer).is_ok();
        drop(state);

        if !accepted {
            return Box::pin(future::ready(Err(WsError::Connection(
                "no listener".to_string(),
            ))));
        }

        let outbound = futures_util::sink::unfold(outbound_tx, |tx, text: String| async move {
            tx.send(text).map_err(|_| WsError::Closed)?;
            Ok::<_, WsError>(tx)
        });

        let link = Link {
            outbound: Box::pin(outbound),
            inbound: UnboundedReceiverStream::new(inbound).boxed(),
        };
        Box::pin(future::ready(Ok(link)))
    }
}
