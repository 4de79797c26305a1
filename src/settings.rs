//! Printer settings store and the endpoint read from it.
//!
//! Settings are a flat string key/value map. The pipeline never caches
//! them: [`PrinterEndpoint::load`] is called on every print attempt so an
//! address changed between two orders takes effect on the next ticket.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::warn;

use crate::Result;

/// Printer host or IP address.
pub const KEY_PRINTER_IP: &str = "printer_ip";
/// Printer TCP port, stored as a string.
pub const KEY_PRINTER_PORT: &str = "printer_port";
/// Display name of the printer.
pub const KEY_PRINTER_NAME: &str = "printer_name";
/// Whether new orders are printed automatically (`"true"` / `"false"`).
pub const KEY_AUTO_PRINT: &str = "auto_print";

/// Raw TCP port used by most network receipt printers.
pub const DEFAULT_PRINTER_PORT: u16 = 9100;

const DEFAULT_PRINTER_NAME: &str = "Kitchen";

/// Key/value persistence consumed by the pipeline.
pub trait Settings: Send + Sync {
    /// Returns the stored value for `key`, or `default` if none is stored.
    fn get(&self, key: &str, default: &str) -> String;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory settings, used when embedding the pipeline and in tests.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<String, String>>,
}

impl MemorySettings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store pre-populated with `pairs`.
    pub fn with_values<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let values = pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            values: RwLock::new(values),
        }
    }
}

impl Settings for MemorySettings {
    fn get(&self, key: &str, default: &str) -> String {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings persisted as a JSON object on disk.
///
/// The file is re-read on every [`get`](Settings::get), so edits made by
/// another process are picked up without a restart. A missing or
/// unreadable file behaves like an empty store.
#[derive(Debug, Clone)]
pub struct FileSettings {
    path: PathBuf,
}

impl FileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Settings for FileSettings {
    fn get(&self, key: &str, default: &str) -> String {
        match self.read_all() {
            Ok(mut values) => values.remove(key).unwrap_or_else(|| default.to_string()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read settings, using default");
                default.to_string()
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        let json = serde_json::to_string_pretty(&values)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

/// Where and whether to print, as currently configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterEndpoint {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub auto_print: bool,
}

impl PrinterEndpoint {
    /// Reads the endpoint from `settings`, applying defaults for missing or
    /// unparseable values.
    pub fn load(settings: &dyn Settings) -> Self {
        let host = settings.get(KEY_PRINTER_IP, "").trim().to_string();
        let port = parse_port(&settings.get(KEY_PRINTER_PORT, "9100"));
        let name = settings.get(KEY_PRINTER_NAME, DEFAULT_PRINTER_NAME);
        let auto_print = parse_flag(&settings.get(KEY_AUTO_PRINT, "true"), true);

        Self {
            host,
            port,
            name,
            auto_print,
        }
    }

    /// Persists every field of the endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings store cannot be written.
    pub fn save(&self, settings: &dyn Settings) -> Result<()> {
        settings.set(KEY_PRINTER_IP, self.host.trim())?;
        settings.set(KEY_PRINTER_PORT, &self.port.to_string())?;
        settings.set(KEY_PRINTER_NAME, &self.name)?;
        settings.set(KEY_AUTO_PRINT, if self.auto_print { "true" } else { "false" })?;
        Ok(())
    }

    /// `true` once a printer address has been entered.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty()
    }
}

fn parse_port(raw: &str) -> u16 {
    match raw.trim().parse::<u16>() {
        Ok(port) if port != 0 => port,
        _ => DEFAULT_PRINTER_PORT,
    }
}

fn parse_flag(raw: &str, default: bool) -> bool {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}
