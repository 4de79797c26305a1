//! Connection supervisor.
//!
//! One [`Supervisor`] task owns the connection from the first dial until
//! the client is closed. Connections never overlap: a new dial starts only
//! after the previous session has fully ended and the reconnect delay has
//! elapsed.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tungstenite::Message;
use tungstenite::protocol::CloseFrame;
use tungstenite::protocol::frame::coding::CloseCode;

use super::{
    CLIENT_CLOSING, ConnectionState, DesiredState, Dialer, NORMAL_CLOSURE, Shared, StreamConfig,
    StreamEvent,
};

/// How a session or connection attempt ended.
enum Disconnect {
    Closed { code: u16, reason: String },
    Failed(String),
}

impl Disconnect {
    fn client_closing() -> Self {
        Disconnect::Closed {
            code: NORMAL_CLOSURE,
            reason: CLIENT_CLOSING.to_string(),
        }
    }
}

pub(super) struct Supervisor<D: Dialer> {
    config: Arc<StreamConfig>,
    dialer: Arc<D>,
    events: mpsc::UnboundedSender<StreamEvent>,
    shared: Arc<Shared>,
    desired: watch::Receiver<DesiredState>,
}

impl<D: Dialer> Supervisor<D> {
    pub(super) fn new(
        config: Arc<StreamConfig>,
        dialer: Arc<D>,
        events: mpsc::UnboundedSender<StreamEvent>,
        shared: Arc<Shared>,
    ) -> Self {
        let desired = shared.desired.subscribe();
        Self {
            config,
            dialer,
            events,
            shared,
            desired,
        }
    }

    /// Connects, runs the session, and reconnects after a fixed delay
    /// until the client is closed.
    pub(super) async fn run(mut self) {
        loop {
            if self.finish_if_closed() {
                info!("Order stream stopped");
                return;
            }

            self.set_state(ConnectionState::Connecting);
            info!(url = %self.config.url, "Connecting to order stream");

            let outcome = match self.dial().await {
                Ok(socket) => self.session(socket).await,
                Err(disconnect) => disconnect,
            };

            {
                let mut inner = self.shared.lock();
                inner.state = ConnectionState::Disconnected;
                inner.outbound = None;
            }

            match outcome {
                Disconnect::Closed { code, reason } => {
                    info!(code, reason = %reason, "Order stream closed");
                    self.emit(StreamEvent::Closed { code, reason });
                }
                Disconnect::Failed(error) => {
                    warn!(error = %error, "Order stream failed");
                    self.emit(StreamEvent::Failed(error));
                }
            }

            if self.finish_if_closed() {
                info!("Order stream stopped");
                return;
            }

            info!(
                delay_secs = self.config.reconnect_delay.as_secs_f32(),
                "Reconnecting after delay"
            );
            tokio::select! {
                () = tokio::time::sleep(self.config.reconnect_delay) => {}
                () = closed(&mut self.desired) => debug!("Pending reconnect cancelled"),
            }
        }
    }

    /// Opens a socket, giving up on timeout or when the client is closed.
    async fn dial(&mut self) -> Result<D::Socket, Disconnect> {
        let timeout = self.config.connect_timeout;
        let attempt = tokio::time::timeout(timeout, self.dialer.dial(&self.config.url));

        tokio::select! {
            result = attempt => match result {
                Ok(Ok(socket)) => Ok(socket),
                Ok(Err(e)) => Err(Disconnect::Failed(e.to_string())),
                Err(_) => Err(Disconnect::Failed(format!(
                    "connect timed out after {}s",
                    timeout.as_secs()
                ))),
            },
            () = closed(&mut self.desired) => Err(Disconnect::client_closing()),
        }
    }

    /// Runs one open connection until it ends.
    async fn session(&mut self, socket: D::Socket) -> Disconnect {
        let (mut write, mut read) = socket.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

        let opened = {
            let mut inner = self.shared.lock();
            if self.shared.desired() == DesiredState::Active {
                inner.state = ConnectionState::Open;
                inner.outbound = Some(outbound_tx);
                true
            } else {
                false
            }
        };

        if !opened {
            let _ = write.send(Message::Close(Some(normal_close_frame()))).await;
            return Disconnect::client_closing();
        }

        info!("Order stream connected");
        self.emit(StreamEvent::Opened);

        let period = self.config.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + period, period);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Set once either side has sent a close frame.
        let mut close_info: Option<(u16, String)> = None;
        let close_deadline = tokio::time::sleep(self.config.close_timeout);
        tokio::pin!(close_deadline);

        loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        debug!(len = text.len(), "Message received");
                        self.emit(StreamEvent::Message(text.as_str().to_owned()));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.as_str().to_owned()))
                            .unwrap_or((1005, String::new()));
                        debug!(code, reason = %reason, "Close frame received");
                        if close_info.is_none() {
                            self.set_state(ConnectionState::Closing);
                            close_deadline
                                .as_mut()
                                .reset(Instant::now() + self.config.close_timeout);
                            close_info = Some((code, reason));
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        return match close_info {
                            Some((code, reason)) => Disconnect::Closed { code, reason },
                            None => Disconnect::Failed(e.to_string()),
                        };
                    }
                    None => {
                        return match close_info {
                            Some((code, reason)) => Disconnect::Closed { code, reason },
                            None => Disconnect::Failed("connection closed without close frame".to_string()),
                        };
                    }
                },

                Some(text) = outbound_rx.recv(), if close_info.is_none() => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        return Disconnect::Failed(e.to_string());
                    }
                }

                _ = ping.tick(), if close_info.is_none() => {
                    if let Err(e) = write.send(Message::Ping(Default::default())).await {
                        return Disconnect::Failed(e.to_string());
                    }
                    debug!("Sent ping");
                }

                changed = self.desired.changed(), if close_info.is_none() => {
                    if changed.is_err() || *self.desired.borrow() == DesiredState::Closed {
                        self.set_state(ConnectionState::Closing);
                        close_deadline
                            .as_mut()
                            .reset(Instant::now() + self.config.close_timeout);
                        close_info = Some((NORMAL_CLOSURE, CLIENT_CLOSING.to_string()));
                        if let Err(e) = write.send(Message::Close(Some(normal_close_frame()))).await {
                            debug!(error = %e, "Failed to send close frame");
                            return Disconnect::client_closing();
                        }
                    }
                }

                () = &mut close_deadline, if close_info.is_some() => {
                    warn!("Close handshake timed out");
                    let (code, reason) = close_info.take().unwrap_or_default();
                    return Disconnect::Closed { code, reason };
                }
            }
        }
    }

    /// Marks the supervisor finished if the client has been closed.
    ///
    /// Checked under the shared lock so a concurrent `connect()` either
    /// sees this task still running or starts a fresh one.
    fn finish_if_closed(&self) -> bool {
        let mut inner = self.shared.lock();
        if self.shared.desired() == DesiredState::Closed {
            inner.running = false;
            inner.state = ConnectionState::Disconnected;
            inner.outbound = None;
            true
        } else {
            false
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let mut inner = self.shared.lock();
        inner.state = state;
        if state != ConnectionState::Open {
            inner.outbound = None;
        }
    }

    fn emit(&self, event: StreamEvent) {
        if self.events.send(event).is_err() {
            debug!("Stream event receiver dropped");
        }
    }
}

/// Resolves once the client has been closed (or its handle dropped).
async fn closed(desired: &mut watch::Receiver<DesiredState>) {
    let _ = desired.wait_for(|d| *d == DesiredState::Closed).await;
}

fn normal_close_frame() -> CloseFrame {
    CloseFrame {
        code: CloseCode::Normal,
        reason: CLIENT_CLOSING.into(),
    }
}
