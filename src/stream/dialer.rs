//! Opening the underlying WebSocket.

use async_trait::async_trait;
use futures_util::{Sink, Stream};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;
use tungstenite::Message;

use crate::Result;

/// A WebSocket connection over TCP, optionally wrapped in TLS.
pub type WsSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Establishes one WebSocket connection per call.
///
/// Framing, the opening handshake and TLS are the dialer's concern; the
/// stream client only sees a duplex of [`Message`]s.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    type Socket: Stream<Item = std::result::Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Send
        + Unpin
        + 'static;

    /// Connects to `url` and completes the opening handshake.
    ///
    /// # Errors
    ///
    /// Returns a [`KitchenLinkError`](crate::KitchenLinkError) if the
    /// TCP connection, TLS negotiation, or HTTP upgrade fails.
    async fn dial(&self, url: &str) -> Result<Self::Socket>;
}

/// Dials real `ws://` and `wss://` endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsDialer;

#[async_trait]
impl Dialer for WsDialer {
    type Socket = WsSocket;

    async fn dial(&self, url: &str) -> Result<WsSocket> {
        let (ws_stream, response) = connect_async(url).await?;
        debug!(status = %response.status(), "WebSocket handshake completed");

        Ok(ws_stream)
    }
}
