//! Persistent client for the order event stream.
//!
//! [`StreamClient`] keeps one logical WebSocket connection alive for as
//! long as the caller wants it. Everything that happens on the connection
//! is published as a [`StreamEvent`] on a single ordered channel:
//!
//! - [`dialer`] - opening the socket (TLS and handshake included)
//! - [`connection`] - the supervisor task: read loop, keep-alive pings,
//!   and the fixed-delay reconnect policy

mod connection;
mod dialer;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use dialer::{Dialer, WsDialer, WsSocket};

use connection::Supervisor;

/// Time allowed for the TCP connect and opening handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between keep-alive pings on an open connection.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Fixed wait between a disconnect and the next connection attempt.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Time allowed for the peer to answer our close frame.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code sent by [`StreamClient::close`].
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close reason sent by [`StreamClient::close`].
pub const CLIENT_CLOSING: &str = "Client closing";

/// Connection parameters.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub connect_timeout: Duration,
    pub ping_interval: Duration,
    pub reconnect_delay: Duration,
    pub close_timeout: Duration,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: CONNECT_TIMEOUT,
            ping_interval: PING_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
            close_timeout: CLOSE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }
}

/// Something that happened on the stream connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The handshake completed and the connection is open.
    Opened,
    /// A text frame arrived.
    Message(String),
    /// The connection closed with a close handshake.
    Closed { code: u16, reason: String },
    /// Connecting failed, or the connection broke without a close handshake.
    Failed(String),
}

/// Lifecycle of the current connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Closing,
}

/// Whether the caller wants the client connected.
///
/// Read by the supervisor when a reconnect delay elapses, not only when it
/// is scheduled, so a `close()` during the delay always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredState {
    Active,
    Closed,
}

/// State shared between the public handle and the supervisor task.
struct Shared {
    inner: Mutex<Inner>,
    desired: watch::Sender<DesiredState>,
}

struct Inner {
    state: ConnectionState,
    /// `true` while a supervisor task owns the connection.
    running: bool,
    /// Outbound queue of the open connection.
    outbound: Option<mpsc::UnboundedSender<String>>,
    supervisor: Option<JoinHandle<()>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn desired(&self) -> DesiredState {
        *self.desired.borrow()
    }
}

/// Handle to the order event stream connection.
pub struct StreamClient<D: Dialer = WsDialer> {
    config: Arc<StreamConfig>,
    dialer: Arc<D>,
    events: mpsc::UnboundedSender<StreamEvent>,
    shared: Arc<Shared>,
}

impl<D: Dialer> StreamClient<D> {
    /// Creates a disconnected client publishing onto `events`.
    pub fn new(config: StreamConfig, dialer: D, events: mpsc::UnboundedSender<StreamEvent>) -> Self {
        let (desired, _) = watch::channel(DesiredState::Closed);

        Self {
            config: Arc::new(config),
            dialer: Arc::new(dialer),
            events,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: ConnectionState::Disconnected,
                    running: false,
                    outbound: None,
                    supervisor: None,
                }),
                desired,
            }),
        }
    }

    /// Starts maintaining the connection. Does nothing if it is already
    /// being maintained.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(&self) {
        let mut inner = self.shared.lock();
        self.shared.desired.send_replace(DesiredState::Active);

        if inner.running {
            debug!(state = ?inner.state, "Stream client already running");
            return;
        }

        info!(url = %self.config.url, "Starting order stream");
        inner.running = true;
        inner.state = ConnectionState::Connecting;

        let supervisor = Supervisor::new(
            Arc::clone(&self.config),
            Arc::clone(&self.dialer),
            self.events.clone(),
            Arc::clone(&self.shared),
        );
        inner.supervisor = Some(tokio::spawn(supervisor.run()));
    }

    /// Queues a text frame on the open connection.
    ///
    /// Returns `false` if no connection is open. Delivery is not confirmed.
    pub fn send(&self, message: impl Into<String>) -> bool {
        let inner = self.shared.lock();
        if inner.state != ConnectionState::Open || self.shared.desired() != DesiredState::Active {
            return false;
        }

        match &inner.outbound {
            Some(tx) => tx.send(message.into()).is_ok(),
            None => false,
        }
    }

    /// Stops the client: closes the open connection with a normal closure
    /// and cancels any pending reconnect. [`connect`](Self::connect) resumes.
    pub fn close(&self) {
        let _inner = self.shared.lock();
        if self.shared.desired.send_replace(DesiredState::Closed) == DesiredState::Active {
            info!("Closing order stream");
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    /// Waits for the supervisor task to finish, typically after
    /// [`close`](Self::close).
    pub async fn join(&self) {
        let handle = self.shared.lock().supervisor.take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl<D: Dialer> Drop for StreamClient<D> {
    fn drop(&mut self) {
        self.shared.desired.send_replace(DesiredState::Closed);
    }
}
