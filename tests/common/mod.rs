//! Shared test utilities: sample orders, an in-memory WebSocket dialer and
//! an instrumented printer stream.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use kitchenlink::models::{LineItem, Order, OrderType};
use kitchenlink::printer::Connect;
use kitchenlink::stream::Dialer;
use kitchenlink::{KitchenLinkError, Result};
use rust_decimal_macros::dec;
use tokio::io::{AsyncWrite, DuplexStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::Role;

/// Server half of an in-memory WebSocket connection.
pub type ServerSocket = WebSocketStream<DuplexStream>;

/// Dine-in order with two items, the second carrying modifiers.
pub fn sample_order() -> Order {
    Order {
        id: "ord-9f1a23de".to_string(),
        order_type: OrderType::DineIn,
        table_id: "table-0007".to_string(),
        items: vec![
            LineItem::new("Pho Bo", 2, dec!(12.50)),
            LineItem::new("Iced Coffee", 1, dec!(4.25)).with_modifiers(["Less sugar", "No ice"]),
        ],
    }
}

/// `order:new` frame carrying [`sample_order`].
pub fn sample_order_frame() -> String {
    serde_json::json!({
        "type": "order:new",
        "data": {
            "id": "ord-9f1a23de",
            "orderType": "dine-in",
            "tableId": "table-0007",
            "items": [
                { "name": "Pho Bo", "quantity": 2, "unitPrice": "12.50" },
                { "name": "Iced Coffee", "quantity": 1, "unitPrice": 4.25,
                  "modifiers": ["Less sugar", "No ice"] }
            ]
        }
    })
    .to_string()
}

/// How [`FakeDialer`] answers a dial.
#[derive(Debug, Clone, Copy)]
pub enum DialMode {
    /// Fail immediately with "connection refused".
    Refuse,
    /// Hand out the client half of a fresh in-memory connection.
    Accept,
    /// Never complete.
    Hang,
}

/// Dialer backed by `tokio::io::duplex`, counting every attempt.
pub struct FakeDialer {
    mode: DialMode,
    attempts: Arc<AtomicUsize>,
    servers: mpsc::UnboundedSender<ServerSocket>,
}

/// Test side of a [`FakeDialer`].
pub struct FakeServer {
    attempts: Arc<AtomicUsize>,
    sockets: Mutex<mpsc::UnboundedReceiver<ServerSocket>>,
}

impl FakeDialer {
    pub fn new(mode: DialMode) -> (Self, FakeServer) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                mode,
                attempts: Arc::clone(&attempts),
                servers: tx,
            },
            FakeServer {
                attempts,
                sockets: Mutex::new(rx),
            },
        )
    }
}

#[async_trait]
impl Dialer for FakeDialer {
    type Socket = WebSocketStream<DuplexStream>;

    async fn dial(&self, _url: &str) -> Result<Self::Socket> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        match self.mode {
            DialMode::Refuse => Err(KitchenLinkError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
            DialMode::Hang => std::future::pending().await,
            DialMode::Accept => {
                let (client_io, server_io) = tokio::io::duplex(64 * 1024);
                let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
                let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
                let _ = self.servers.send(server);
                Ok(client)
            }
        }
    }
}

impl FakeServer {
    /// Number of dials so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Waits for the next accepted connection.
    pub async fn accept(&self) -> ServerSocket {
        self.sockets
            .lock()
            .await
            .recv()
            .await
            .expect("dialer dropped")
    }
}

/// Reads the next frame that is not a keep-alive.
pub async fn next_frame(socket: &mut ServerSocket) -> Option<Message> {
    loop {
        match socket.next().await {
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            Some(Ok(message)) => return Some(message),
            Some(Err(_)) | None => return None,
        }
    }
}

/// Counts how a printer stream is torn down.
#[derive(Debug, Default)]
pub struct Teardown {
    pub shutdowns: AtomicUsize,
    pub drops: AtomicUsize,
}

/// Write half that records shutdowns and drops of the inner stream.
pub struct CountingStream<S> {
    inner: S,
    teardown: Arc<Teardown>,
}

impl<S> CountingStream<S> {
    pub fn new(inner: S, teardown: Arc<Teardown>) -> Self {
        Self { inner, teardown }
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for CountingStream<S> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let result = Pin::new(&mut self.inner).poll_shutdown(cx);
        if result.is_ready() {
            self.teardown.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
        result
    }
}

impl<S> Drop for CountingStream<S> {
    fn drop(&mut self) {
        self.teardown.drops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out one prepared stream.
pub struct OnceConnector<S> {
    stream: std::sync::Mutex<Option<S>>,
}

impl<S> OnceConnector<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: std::sync::Mutex::new(Some(stream)),
        }
    }
}

#[async_trait]
impl<S: AsyncWrite + Send + Unpin + 'static> Connect for OnceConnector<S> {
    type Stream = S;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<S> {
        self.stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| io::Error::from(io::ErrorKind::ConnectionRefused))
    }
}

/// Connector whose connect never completes.
pub struct StalledConnector;

#[async_trait]
impl Connect for StalledConnector {
    type Stream = DuplexStream;

    async fn connect(&self, _host: &str, _port: u16) -> io::Result<DuplexStream> {
        std::future::pending().await
    }
}

/// Short settle delay so tests using real sockets stay fast.
pub const TEST_SETTLE_DELAY: Duration = Duration::from_millis(10);
