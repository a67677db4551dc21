//! Optional JSON overrides for the built-in defaults.
//!
//! The file is named by `FINGERLINK_CONFIG`. Every field is optional;
//! missing fields keep the compiled-in value.
//!
//! ```json
//! {
//!   "server_host": "10.0.0.5",
//!   "server_port": 5050,
//!   "feedback_timeout_ms": 10000,
//!   "enroll_attempts": 3
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use fingerlink_core::constants::{DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT};
use fingerlink_device::DeviceConfig;
use fingerlink_network::ConnectionConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "FINGERLINK_CONFIG";

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub feedback_timeout_ms: Option<u64>,
    pub enroll_attempts: Option<u32>,
    pub clear_store_on_start: Option<bool>,
    pub reconnect_on_loss: Option<bool>,
    pub store_capacity: Option<u16>,
}

impl FileConfig {
    /// Read the file named by [`CONFIG_ENV`], or all defaults if unset.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Build the connection and device settings.
    pub fn resolve(self) -> (ConnectionConfig, DeviceConfig) {
        let mut connection = ConnectionConfig::default();
        let mut device = DeviceConfig::default();

        if self.server_host.is_some() || self.server_port.is_some() {
            let host = self.server_host.as_deref().unwrap_or(DEFAULT_SERVER_HOST);
            let port = self.server_port.unwrap_or(DEFAULT_SERVER_PORT);
            connection.server_addr = format!("{host}:{port}");
        }
        if let Some(ms) = self.feedback_timeout_ms {
            connection.feedback_timeout = Duration::from_millis(ms);
        }

        if self.enroll_attempts.is_some() {
            device.enroll_attempts = self.enroll_attempts;
        }
        if let Some(clear) = self.clear_store_on_start {
            device.clear_store_on_start = clear;
        }
        if let Some(reconnect) = self.reconnect_on_loss {
            device.reconnect_on_loss = reconnect;
        }
        if let Some(capacity) = self.store_capacity {
            device.store_capacity = capacity;
        }

        (connection, device)
    }
}
