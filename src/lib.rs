//! Kitchen order relay.
//!
//! Listens to a restaurant's order event stream over WebSocket and prints
//! a kitchen ticket on an ESC/POS network printer for every new order.
//! The stream client reconnects on its own; printing is best-effort and
//! never disturbs the stream.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod escpos;
pub mod models;
pub mod printer;
pub mod settings;
pub mod stream;
pub mod ticket;
pub mod ui;

pub use error::{KitchenLinkError, Result};
