//! Application configuration loaded from environment variables.
//!
//! The restaurant identifier **must** be provided:
//! - `KITCHENLINK_RESTAURANT_ID`: tenant whose orders are streamed
//!
//! Optional overrides:
//! - `KITCHENLINK_STREAM_URL`: order event endpoint
//! - `KITCHENLINK_SETTINGS_PATH`: printer settings file

use std::path::PathBuf;

/// Default order event endpoint.
const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:8080/ws/orders";

/// Default location of the printer settings file.
const DEFAULT_SETTINGS_PATH: &str = "printer_settings.json";

/// Top-level application configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub stream: StreamSettings,
}

/// Order stream connection values.
#[derive(Debug)]
pub struct StreamSettings {
    pub base_url: String,
    pub restaurant_id: String,
}

impl AppConfig {
    /// Returns the full stream URL with the `restaurantId` query parameter.
    pub fn stream_url(&self) -> String {
        let separator = if self.stream.base_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{separator}restaurantId={}",
            self.stream.base_url, self.stream.restaurant_id
        )
    }
}

/// Loads the application configuration from environment variables.
///
/// # Errors
///
/// Returns [`KitchenLinkError::Config`](crate::KitchenLinkError::Config)
/// if `KITCHENLINK_RESTAURANT_ID` is unset, empty or not URL-safe, or if the stream URL
/// is not a `ws://` or `wss://` URL.
pub fn fetch_config() -> crate::Result<AppConfig> {
    let base_url =
        non_empty_var("KITCHENLINK_STREAM_URL").unwrap_or_else(|| DEFAULT_STREAM_URL.to_string());

    if !(base_url.starts_with("ws://") || base_url.starts_with("wss://")) {
        return Err(crate::KitchenLinkError::Config(format!(
            "KITCHENLINK_STREAM_URL must start with ws:// or wss://, got {base_url}"
        )));
    }

    let restaurant_id = non_empty_var("KITCHENLINK_RESTAURANT_ID").ok_or_else(|| {
        crate::KitchenLinkError::Config("KITCHENLINK_RESTAURANT_ID is not set".to_string())
    })?;

    // Goes into the query string verbatim.
    if !restaurant_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    {
        return Err(crate::KitchenLinkError::Config(format!(
            "KITCHENLINK_RESTAURANT_ID may only contain letters, digits, '-', '_', '.' and '~', got {restaurant_id:?}"
        )));
    }

    Ok(AppConfig {
        stream: StreamSettings {
            base_url,
            restaurant_id,
        },
    })
}

/// Returns the printer settings file location.
///
/// Available without a full [`AppConfig`] so printer maintenance commands
/// work before the stream is configured.
pub fn settings_path() -> PathBuf {
    non_empty_var("KITCHENLINK_SETTINGS_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_PATH))
}

/// Returns the value of an environment variable if it exists and is non-empty.
fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Serializes tests that touch the process environment.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    /// Helper that temporarily sets env vars, runs `f`, then restores originals.
    fn with_env<F: FnOnce()>(vars: &[(&str, Option<&str>)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let originals: Vec<(&str, Option<String>)> = vars
            .iter()
            .map(|(k, _)| (*k, std::env::var(k).ok()))
            .collect();

        for (k, v) in vars {
            // SAFETY: every env-mutating test holds ENV_LOCK.
            unsafe {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }

        f();

        for (k, original) in originals {
            // SAFETY: restoring original values under the same lock.
            unsafe {
                match original {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn defaults_with_only_restaurant_id() {
        with_env(
            &[
                ("KITCHENLINK_RESTAURANT_ID", Some("r-1")),
                ("KITCHENLINK_STREAM_URL", None),
                ("KITCHENLINK_SETTINGS_PATH", None),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(config.stream.base_url, DEFAULT_STREAM_URL);
                assert_eq!(settings_path(), PathBuf::from(DEFAULT_SETTINGS_PATH));
                assert_eq!(
                    config.stream_url(),
                    "ws://127.0.0.1:8080/ws/orders?restaurantId=r-1"
                );
            },
        );
    }

    #[test]
    fn rejects_missing_restaurant_id() {
        with_env(&[("KITCHENLINK_RESTAURANT_ID", None)], || {
            let err = fetch_config().unwrap_err();
            assert!(err.to_string().contains("KITCHENLINK_RESTAURANT_ID"));
        });
    }

    #[test]
    fn empty_values_treated_as_absent() {
        with_env(
            &[
                ("KITCHENLINK_RESTAURANT_ID", Some("")),
                ("KITCHENLINK_STREAM_URL", Some("")),
            ],
            || {
                assert!(fetch_config().is_err());
            },
        );
    }

    #[test]
    fn custom_url_keeps_existing_query() {
        with_env(
            &[
                ("KITCHENLINK_RESTAURANT_ID", Some("abc")),
                ("KITCHENLINK_STREAM_URL", Some("wss://orders.example.com/ws?v=2")),
                ("KITCHENLINK_SETTINGS_PATH", Some("/tmp/printer.json")),
            ],
            || {
                let config = fetch_config().unwrap();
                assert_eq!(
                    config.stream_url(),
                    "wss://orders.example.com/ws?v=2&restaurantId=abc"
                );
                assert_eq!(settings_path(), PathBuf::from("/tmp/printer.json"));
            },
        );
    }

    #[test]
    fn rejects_non_websocket_url() {
        with_env(
            &[
                ("KITCHENLINK_RESTAURANT_ID", Some("abc")),
                ("KITCHENLINK_STREAM_URL", Some("https://orders.example.com")),
            ],
            || {
                let err = fetch_config().unwrap_err();
                assert!(err.to_string().contains("ws://"));
            },
        );
    }

    #[test]
    fn rejects_restaurant_id_needing_escapes() {
        for id in ["a&b", "r 1", "x#y", "caf\u{e9}"] {
            with_env(
                &[
                    ("KITCHENLINK_RESTAURANT_ID", Some(id)),
                    ("KITCHENLINK_STREAM_URL", None),
                ],
                || {
                    let err = fetch_config().unwrap_err();
                    assert!(err.to_string().contains("KITCHENLINK_RESTAURANT_ID"));
                },
            );
        }
    }
}
