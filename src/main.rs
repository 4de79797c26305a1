use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kitchenlink::config::{fetch_config, settings_path};
use kitchenlink::dispatch::OrderDispatcher;
use kitchenlink::printer::{DEFAULT_CONNECT_TIMEOUT, PrinterTransport};
use kitchenlink::settings::{FileSettings, KEY_AUTO_PRINT, PrinterEndpoint, Settings};
use kitchenlink::stream::{StreamClient, StreamConfig, WsDialer};
use kitchenlink::ticket::encode_test_page;
use kitchenlink::ui::{UiEvent, UiHandle};
use kitchenlink::{KitchenLinkError, Result};

#[derive(Parser)]
#[command(name = "kitchenlink", version, about = "Prints kitchen tickets for incoming orders")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for orders and print kitchen tickets (default).
    Run,
    /// Check that the configured printer accepts connections.
    TestConnection,
    /// Print a test page on the configured printer.
    TestPrint,
    /// Store the printer address.
    SetPrinter {
        host: String,
        #[arg(long, default_value_t = kitchenlink::settings::DEFAULT_PRINTER_PORT)]
        port: u16,
        #[arg(long)]
        name: Option<String>,
    },
    /// Turn automatic printing of new orders on or off.
    AutoPrint { state: Toggle },
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = Arc::new(FileSettings::new(settings_path()));

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::TestConnection => {
            let endpoint = PrinterEndpoint::load(&*settings);
            PrinterTransport::new()
                .test_connection(&endpoint.host, endpoint.port, DEFAULT_CONNECT_TIMEOUT)
                .await?;
            info!(host = %endpoint.host, port = endpoint.port, "Printer connection OK");
            Ok(())
        }
        Command::TestPrint => {
            let endpoint = PrinterEndpoint::load(&*settings);
            let page = encode_test_page(&endpoint.host, endpoint.port, Local::now().naive_local());
            PrinterTransport::new().print_ticket(&endpoint, &page).await?;
            info!(host = %endpoint.host, port = endpoint.port, "Test page sent");
            Ok(())
        }
        Command::SetPrinter { host, port, name } => {
            let mut endpoint = PrinterEndpoint::load(&*settings);
            endpoint.host = host.trim().to_string();
            endpoint.port = port;
            if let Some(name) = name {
                endpoint.name = name;
            }
            if !endpoint.is_configured() {
                return Err(KitchenLinkError::Config("printer host must not be empty".to_string()));
            }
            endpoint.save(&*settings)?;
            info!(path = %settings.path().display(), "Printer settings saved");
            Ok(())
        }
        Command::AutoPrint { state } => {
            let value = match state {
                Toggle::On => "true",
                Toggle::Off => "false",
            };
            settings.set(KEY_AUTO_PRINT, value)?;
            info!(auto_print = value, "Printer settings saved");
            Ok(())
        }
    }
}

/// Streams orders until Ctrl-C. The main task plays the UI role: it is the
/// only consumer of [`UiEvent`]s.
async fn run(settings: Arc<FileSettings>) -> Result<()> {
    let app_config = fetch_config()?;

    let (ui, mut ui_rx) = UiHandle::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let client = StreamClient::new(StreamConfig::new(app_config.stream_url()), WsDialer, events_tx);
    let dispatcher = OrderDispatcher::new(settings, PrinterTransport::new(), ui);
    let dispatcher_task = tokio::spawn(dispatcher.run(events_rx));

    client.connect();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            Some(event) = ui_rx.recv() => report(&event),
            result = &mut shutdown => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                info!("Shutting down");
                break;
            }
        }
    }

    client.close();
    client.join().await;
    drop(client);
    if let Err(e) = dispatcher_task.await {
        warn!(error = %e, "Order dispatcher task failed");
    }

    Ok(())
}

fn report(event: &UiEvent) {
    match event {
        UiEvent::Connected => info!("Connected to orders"),
        UiEvent::Disconnected { code, reason } => info!(code, reason = %reason, "Disconnected from orders"),
        UiEvent::ConnectionError(error) => warn!(error = %error, "Order stream error"),
        UiEvent::MessageReceived => {}
        UiEvent::OrderReceived { order_id } => info!(order_id = %order_id, "New order received!"),
        UiEvent::MessageDropped { error } => warn!(error = %error, "Unreadable order message"),
        UiEvent::PrinterNotConfigured { order_id } => {
            warn!(order_id = %order_id, "No printer configured, ticket not printed")
        }
        UiEvent::PrintSucceeded { order_id } => info!(order_id = %order_id, "Ticket printed"),
        UiEvent::PrintFailed { order_id, error } => {
            warn!(order_id = %order_id, error = %error, "Print failed")
        }
    }
}
