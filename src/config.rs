//! Client configuration.
//!
//! Resolution order, later sources winning:
//!
//! 1. Built-in defaults (`127.0.0.1:1967`)
//! 2. JSON file at `$CHAT_CLIENT_CONFIG`, or `<config dir>/chat-client/config.json`
//! 3. `CHAT_CLIENT_HOST`, `CHAT_CLIENT_PORT`, `CHAT_CLIENT_CONNECT_TIMEOUT`
//!
//! Every field is optional in the file:
//!
//! ```json
//! { "host": "chat.example.org", "port": 4000 }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::protocol::DEFAULT_MAX_FRAME_SIZE;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "CHAT_CLIENT_CONFIG";
const HOST_ENV: &str = "CHAT_CLIENT_HOST";
const PORT_ENV: &str = "CHAT_CLIENT_PORT";
const CONNECT_TIMEOUT_ENV: &str = "CHAT_CLIENT_CONNECT_TIMEOUT";

/// Default connect timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server host name or address.
    pub host: String,
    /// Server TCP port.
    pub port: u16,
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout_secs: u64,
    /// Largest inbound frame payload accepted before the connection is dropped.
    pub max_frame_size: usize,
    /// Bytes requested from the socket per read.
    pub read_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1967,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_chunk_size: 8 * 1024,
        }
    }
}

/// Default location of the config file.
///
/// `~/.config/chat-client/config.json` on Linux,
/// `~/Library/Application Support/chat-client/config.json` on macOS.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("chat-client").join("config.json"))
}

impl ClientConfig {
    /// Load configuration from the config file (if any) and the environment.
    ///
    /// A missing file is not an error; an unreadable or malformed one is.
    pub fn load() -> Result<Self> {
        let path = std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .or_else(default_config_path);

        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host;
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.port = port
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", PORT_ENV, port))?;
        }
        if let Some(secs) = lookup(CONNECT_TIMEOUT_ENV) {
            self.connect_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("Invalid {} value: {}", CONNECT_TIMEOUT_ENV, secs))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            bail!("Server host must not be empty");
        }
        if self.port == 0 {
            bail!("Server port must be non-zero");
        }
        if self.connect_timeout_secs == 0 {
            bail!("Connect timeout must be at least one second");
        }
        if self.max_frame_size == 0 || self.read_chunk_size == 0 {
            bail!("Frame size limit and read chunk size must be non-zero");
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 1967);
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"host":"chat.example.org","port":4000}"#).unwrap();

        assert_eq!(
            config,
            ClientConfig {
                host: "chat.example.org".to_string(),
                port: 4000,
                ..ClientConfig::default()
            }
        );
    }

    #[test]
    fn test_overrides_replace_values() {
        let mut config = ClientConfig::default();
        config
            .apply_overrides(lookup_from(&[
                ("CHAT_CLIENT_HOST", "10.0.0.5"),
                ("CHAT_CLIENT_PORT", " 5555 "),
                ("CHAT_CLIENT_CONNECT_TIMEOUT", "5"),
            ]))
            .unwrap();

        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.port, 5555);
        assert_eq!(config.connect_timeout_secs, 5);
    }

    #[test]
    fn test_invalid_port_override_is_an_error() {
        let mut config = ClientConfig::default();
        let err = config
            .apply_overrides(lookup_from(&[("CHAT_CLIENT_PORT", "not-a-port")]))
            .unwrap_err();

        assert!(
            err.to_string().contains("CHAT_CLIENT_PORT"),
            "Expected port error, got: {}",
            err
        );
    }

    #[test]
    fn test_validate_rejects_zero_port() {
        let config = ClientConfig {
            port: 0,
            ..ClientConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_reports_path_on_bad_json() {
        let path = std::env::temp_dir().join(format!(
            "chat-client-config-test-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, "{ not json").unwrap();

        let err = ClientConfig::from_file(&path).unwrap_err();
        let _ = std::fs::remove_file(&path);

        assert!(
            err.to_string().contains("Invalid config file"),
            "Expected config error, got: {}",
            err
        );
    }

    #[test]
    fn test_default_config_path_format() {
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("chat-client/config.json"));
        }
    }
}
