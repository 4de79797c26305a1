//! Order event dispatch: the glue between the stream and the printer.
//!
//! [`OrderDispatcher::run`] is the single consumer of the stream event
//! channel. Parse failures and print failures are reported to the UI and
//! otherwise ignored; neither ever affects the stream connection.

use std::sync::Arc;

use chrono::{Local, NaiveTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::OrderEvent;
use crate::printer::{Connect, PrintError, PrinterTransport, TcpConnector};
use crate::settings::{PrinterEndpoint, Settings};
use crate::stream::StreamEvent;
use crate::ticket::encode_kitchen_ticket;
use crate::ui::{UiEvent, UiHandle};

/// What the dispatcher did with one message.
#[derive(Debug)]
pub enum Dispatch {
    /// Not an `order:new` event.
    Ignored(String),
    /// The message could not be parsed.
    Dropped,
    /// New order, auto-print is off.
    PrintDisabled { order_id: String },
    /// New order, no printer address configured.
    NotConfigured { order_id: String },
    /// New order, kitchen ticket handed to a print task.
    Submitted {
        order_id: String,
        job: JoinHandle<Result<(), PrintError>>,
    },
}

/// Turns `order:new` events into kitchen tickets.
pub struct OrderDispatcher<C: Connect + 'static = TcpConnector> {
    settings: Arc<dyn Settings>,
    printer: Arc<PrinterTransport<C>>,
    ui: UiHandle,
    clock: fn() -> NaiveTime,
}

impl<C: Connect + 'static> OrderDispatcher<C> {
    pub fn new(settings: Arc<dyn Settings>, printer: PrinterTransport<C>, ui: UiHandle) -> Self {
        Self {
            settings,
            printer: Arc::new(printer),
            ui,
            clock: local_time,
        }
    }

    /// Replaces the clock used for the ticket timestamp.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveTime) -> Self {
        self.clock = clock;
        self
    }

    /// Consumes stream events until the stream client is dropped.
    pub async fn run(self, mut events: mpsc::UnboundedReceiver<StreamEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                StreamEvent::Opened => self.ui.post(UiEvent::Connected),
                StreamEvent::Message(text) => {
                    self.ui.post(UiEvent::MessageReceived);
                    self.handle_message(&text);
                }
                StreamEvent::Closed { code, reason } => {
                    self.ui.post(UiEvent::Disconnected { code, reason });
                }
                StreamEvent::Failed(error) => self.ui.post(UiEvent::ConnectionError(error)),
            }
        }
        debug!("Stream event channel closed, dispatcher stopping");
    }

    /// Handles one text frame from the stream.
    ///
    /// Must be called from within a Tokio runtime; print jobs are spawned.
    pub fn handle_message(&self, text: &str) -> Dispatch {
        let event = match OrderEvent::parse(text) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed message");
                self.ui.post(UiEvent::MessageDropped {
                    error: e.to_string(),
                });
                return Dispatch::Dropped;
            }
        };

        let order = match event {
            OrderEvent::NewOrder(order) => order,
            OrderEvent::Other(kind) => {
                debug!(kind = %kind, "Ignoring event");
                return Dispatch::Ignored(kind);
            }
        };

        let order_id = order.id.clone();
        info!(
            order_id = %order_id,
            order_type = order.order_type.as_str(),
            items = order.items.len(),
            "New order received"
        );
        self.ui.post(UiEvent::OrderReceived {
            order_id: order_id.clone(),
        });

        let endpoint = PrinterEndpoint::load(self.settings.as_ref());
        if !endpoint.auto_print {
            debug!(order_id = %order_id, "Auto-print disabled");
            return Dispatch::PrintDisabled { order_id };
        }
        if !endpoint.is_configured() {
            warn!(order_id = %order_id, "No printer configured");
            self.ui.post(UiEvent::PrinterNotConfigured {
                order_id: order_id.clone(),
            });
            return Dispatch::NotConfigured { order_id };
        }

        let ticket = encode_kitchen_ticket(&order, (self.clock)());
        let printer = Arc::clone(&self.printer);
        let ui = self.ui.clone();
        let job_order_id = order_id.clone();

        let job = tokio::spawn(async move {
            let result = printer.print_ticket(&endpoint, &ticket).await;
            match &result {
                Ok(()) => {
                    info!(order_id = %job_order_id, "Order printed");
                    ui.post(UiEvent::PrintSucceeded {
                        order_id: job_order_id,
                    });
                }
                Err(e) => {
                    warn!(order_id = %job_order_id, error = %e, "Order print failed");
                    ui.post(UiEvent::PrintFailed {
                        order_id: job_order_id,
                        error: e.to_string(),
                    });
                }
            }
            result
        });

        Dispatch::Submitted { order_id, job }
    }
}

fn local_time() -> NaiveTime {
    Local::now().time()
}
