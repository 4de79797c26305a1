//! Advisory notifications for the user interface.
//!
//! The pipeline never touches UI state directly. It posts [`UiEvent`]s on a
//! queue whose single consumer runs on the UI's own context; nothing in the
//! pipeline waits for that consumer.

use tokio::sync::mpsc;
use tracing::debug;

/// A status change worth showing to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// The order stream is connected.
    Connected,
    /// The order stream closed; a reconnect follows unless it was closed on purpose.
    Disconnected { code: u16, reason: String },
    /// The order stream failed; a reconnect follows.
    ConnectionError(String),
    /// A message arrived on the stream.
    MessageReceived,
    /// A new order arrived.
    OrderReceived { order_id: String },
    /// A message could not be parsed and was dropped.
    MessageDropped { error: String },
    /// Auto-print is on but no printer address is set.
    PrinterNotConfigured { order_id: String },
    /// The kitchen ticket reached the printer.
    PrintSucceeded { order_id: String },
    /// The kitchen ticket could not be delivered. It is not retried.
    PrintFailed { order_id: String, error: String },
}

/// Posts [`UiEvent`]s to the UI context.
#[derive(Debug, Clone)]
pub struct UiHandle {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiHandle {
    /// Creates a handle and the receiver the UI context drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Schedules `event` for the UI. Never blocks; dropped if the UI is gone.
    pub fn post(&self, event: UiEvent) {
        if self.tx.send(event).is_err() {
            debug!("UI receiver dropped");
        }
    }
}
