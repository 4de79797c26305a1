//! Crate-level error types.
//!
//! [`KitchenLinkError`] unifies every error source (configuration, WebSocket,
//! JSON, settings I/O, printing) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator.

use crate::printer::PrintError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, KitchenLinkError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum KitchenLinkError {
    /// Required configuration was missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading or writing the local settings file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A print job could not be delivered.
    #[error("print error: {0}")]
    Print(#[from] PrintError),
}
