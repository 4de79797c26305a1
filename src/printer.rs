//! Raw TCP delivery of ESC/POS bytes to a network printer.
//!
//! Each call is an independent attempt against the address passed in:
//! connect, write, flush, let the printer drain its buffer, close. There
//! is no queue and no retry; a failed job is reported once and dropped.

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

use crate::escpos::CASH_DRAWER_KICK;
use crate::settings::PrinterEndpoint;
use crate::ticket::TicketDocument;

/// Connect timeout for print jobs and connection tests.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pause between flushing and closing; some firmware drops the tail of
/// its buffer if the peer disconnects immediately.
pub const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Why a print job or connection test failed.
#[derive(Debug, thiserror::Error)]
pub enum PrintError {
    /// No printer address is configured.
    #[error("no printer configured")]
    NotConfigured,

    /// The printer did not accept the connection in time.
    #[error("connection to {addr} timed out after {}s", timeout.as_secs_f32())]
    Timeout { addr: String, timeout: Duration },

    /// The connection was refused or the host is unreachable.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Writing the job failed part-way.
    #[error("write failed: {0}")]
    Write(#[source] io::Error),

    /// Flushing the socket failed.
    #[error("flush failed: {0}")]
    Flush(#[source] io::Error),
}

impl PrintError {
    /// The underlying I/O error, if the failure came from the socket.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            PrintError::Connect { source, .. } => Some(source),
            PrintError::Write(e) | PrintError::Flush(e) => Some(e),
            PrintError::NotConfigured | PrintError::Timeout { .. } => None,
        }
    }
}

/// Opens the byte stream a job is written to.
#[async_trait]
pub trait Connect: Send + Sync {
    type Stream: AsyncWrite + Send + Unpin;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

/// Plain TCP, as spoken by JetDirect-style printer ports.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connect for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

/// Sends print jobs to a printer over a raw byte stream.
#[derive(Debug, Clone)]
pub struct PrinterTransport<C = TcpConnector> {
    connector: C,
    connect_timeout: Duration,
    settle_delay: Duration,
}

impl PrinterTransport<TcpConnector> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }
}

impl Default for PrinterTransport<TcpConnector> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connect> PrinterTransport<C> {
    pub fn with_connector(connector: C) -> Self {
        Self {
            connector,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            settle_delay: SETTLE_DELAY,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Checks that the printer accepts connections. No data is sent.
    ///
    /// # Errors
    ///
    /// Returns a [`PrintError`] if the host is empty, the connection times
    /// out, or it is refused.
    #[instrument(skip(self), fields(addr = %format!("{host}:{port}")))]
    pub async fn test_connection(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<(), PrintError> {
        let mut stream = self.open(host, port, timeout).await.inspect_err(|e| {
            warn!(error = %e, "Printer connection test failed");
        })?;

        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Error closing test connection");
        }
        info!("Printer reachable");
        Ok(())
    }

    /// Writes `data` to the printer, optionally followed by the cash drawer
    /// kick, then flushes, waits for the settle delay and closes.
    ///
    /// The socket is shut down and released on every path once it has been
    /// opened, including a failed write. Partial writes are not resumed.
    ///
    /// # Errors
    ///
    /// Returns a [`PrintError`] describing the first step that failed.
    #[instrument(skip(self, data), fields(addr = %format!("{host}:{port}"), bytes = data.len()))]
    pub async fn print_raw(
        &self,
        host: &str,
        port: u16,
        data: &[u8],
        kick_cash_drawer: bool,
    ) -> Result<(), PrintError> {
        let mut stream = self
            .open(host, port, self.connect_timeout)
            .await
            .inspect_err(|e| warn!(error = %e, "Print failed"))?;

        let result = self.deliver(&mut stream, data, kick_cash_drawer).await;

        if let Err(e) = stream.shutdown().await {
            debug!(error = %e, "Error closing printer socket");
        }
        drop(stream);

        match &result {
            Ok(()) => info!("Print job sent"),
            Err(e) => warn!(error = %e, "Print failed"),
        }
        result
    }

    /// Sends an encoded ticket to `endpoint`.
    ///
    /// # Errors
    ///
    /// See [`print_raw`](Self::print_raw).
    pub async fn print_ticket(
        &self,
        endpoint: &PrinterEndpoint,
        ticket: &TicketDocument,
    ) -> Result<(), PrintError> {
        self.print_raw(&endpoint.host, endpoint.port, ticket.as_bytes(), false)
            .await
    }

    async fn open(&self, host: &str, port: u16, timeout: Duration) -> Result<C::Stream, PrintError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(PrintError::NotConfigured);
        }

        let addr = format!("{host}:{port}");
        debug!(%addr, "Connecting to printer");

        match tokio::time::timeout(timeout, self.connector.connect(host, port)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(source)) => Err(PrintError::Connect { addr, source }),
            Err(_) => Err(PrintError::Timeout { addr, timeout }),
        }
    }

    async fn deliver(
        &self,
        stream: &mut C::Stream,
        data: &[u8],
        kick_cash_drawer: bool,
    ) -> Result<(), PrintError> {
        stream.write_all(data).await.map_err(PrintError::Write)?;

        if kick_cash_drawer {
            stream
                .write_all(CASH_DRAWER_KICK)
                .await
                .map_err(PrintError::Write)?;
        }

        stream.flush().await.map_err(PrintError::Flush)?;
        tokio::time::sleep(self.settle_delay).await;

        Ok(())
    }
}
