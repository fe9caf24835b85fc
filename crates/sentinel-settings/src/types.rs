//! Settings types. Every struct is `#[serde(default)]` so a partial file
//! only has to name the keys it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings document (`~/.sentinel/settings.json`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SentinelSettings {
    /// HTTP and WebSocket listener.
    pub server: ServerSettings,
    /// Session persistence.
    pub store: StoreSettings,
    /// Log level and format.
    pub logging: LoggingSettings,
    /// `sentinel watch` settings.
    pub client: ClientSettings,
}

impl SentinelSettings {
    /// Reject combinations the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_connections == 0 {
            return Err(SettingsError::InvalidValue(
                "server.maxConnections must be at least 1".into(),
            ));
        }
        if self.server.send_queue_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "server.sendQueueCapacity must be at least 1".into(),
            ));
        }
        if !self.server.ws_path.starts_with('/') {
            return Err(SettingsError::InvalidValue(format!(
                "server.wsPath must start with '/': {}",
                self.server.ws_path
            )));
        }
        if self.server.heartbeat_interval_secs == 0
            || self.server.heartbeat_timeout_secs < self.server.heartbeat_interval_secs
        {
            return Err(SettingsError::InvalidValue(
                "heartbeat timeout must be >= interval and interval > 0".into(),
            ));
        }
        if self.client.history_capacity == 0 {
            return Err(SettingsError::InvalidValue(
                "client.historyCapacity must be at least 1".into(),
            ));
        }
        if self.store.backend == StoreBackend::Sqlite && self.store.sqlite_path.is_empty() {
            return Err(SettingsError::InvalidValue(
                "store.sqlitePath is required for the sqlite backend".into(),
            ));
        }
        Ok(())
    }
}

/// Relay server network and runtime settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Path of the WebSocket endpoint.
    pub ws_path: String,
    /// Upgrades beyond this many open connections are refused.
    pub max_connections: usize,
    /// Outbound frames buffered per connection before it counts as slow.
    pub send_queue_capacity: usize,
    /// A single socket write taking longer than this closes the connection.
    pub send_timeout_ms: u64,
    /// Ping interval.
    pub heartbeat_interval_secs: u64,
    /// Silence longer than this closes the connection.
    pub heartbeat_timeout_secs: u64,
    /// Largest inbound frame accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            ws_path: "/ws".to_string(),
            max_connections: 256,
            send_queue_capacity: 256,
            send_timeout_ms: 5_000,
            heartbeat_interval_secs: 30,
            heartbeat_timeout_secs: 90,
            max_message_size: 1024 * 1024,
        }
    }
}

/// Which session store backs recording.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

/// Session persistence.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoreSettings {
    /// Which store implementation to open.
    pub backend: StoreBackend,
    /// Database file for the sqlite backend.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            sqlite_path: crate::loader::sentinel_home()
                .join("sessions.db")
                .to_string_lossy()
                .into_owned(),
        }
    }
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level (`trace`..`error`). `RUST_LOG` still wins.
    pub level: String,
    /// Emit JSON lines.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Subscriber-side settings used by `sentinel watch`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Relay WebSocket endpoint.
    pub url: String,
    /// Retries before giving up.
    pub max_reconnect_attempts: u32,
    /// Reconnect delay unit in milliseconds.
    pub reconnect_base_delay_ms: u64,
    /// Samples kept by `sentinel watch`.
    pub history_capacity: usize,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            url: "ws://localhost:3001/ws".to_string(),
            max_reconnect_attempts: 5,
            reconnect_base_delay_ms: 1_000,
            history_capacity: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SentinelSettings::default();
        assert_eq!(s.server.port, 3001);
        assert_eq!(s.server.ws_path, "/ws");
        assert_eq!(s.server.max_connections, 256);
        assert_eq!(s.store.backend, StoreBackend::Memory);
        assert_eq!(s.client.max_reconnect_attempts, 5);
        assert_eq!(s.client.reconnect_base_delay_ms, 1_000);
        assert_eq!(s.client.history_capacity, 50);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let value = serde_json::to_value(SentinelSettings::default()).unwrap();
        assert_eq!(value["server"]["wsPath"], "/ws");
        assert_eq!(value["client"]["historyCapacity"], 50);
        assert_eq!(value["store"]["backend"], "memory");
    }

    #[test]
    fn validate_rejects_zero_connections() {
        let mut s = SentinelSettings::default();
        s.server.max_connections = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidValue(_))));
    }

    #[test]
    fn validate_rejects_relative_ws_path() {
        let mut s = SentinelSettings::default();
        s.server.ws_path = "ws".into();
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_timeout_below_interval() {
        let mut s = SentinelSettings::default();
        s.server.heartbeat_timeout_secs = 10;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_history() {
        let mut s = SentinelSettings::default();
        s.client.history_capacity = 0;
        assert!(s.validate().is_err());
    }
}
