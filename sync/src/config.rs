//! Sync service configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use jamscan_rpc::{ClientConfig, ReconnectPolicy};

use crate::SyncError;

/// Configuration for the jamscan sync daemon.
///
/// Can be loaded from a TOML file via [`SyncConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Node WebSocket endpoint used when no active endpoint is persisted yet.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Data directory for the LMDB store.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// Whether to serve the read-only HTTP API.
    #[serde(default = "default_true")]
    pub enable_api: bool,

    /// HTTP API port (if enabled).
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Bounded wait for an RPC call response, in milliseconds.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// Interval of the `now` clock tick, in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// First reconnect delay; doubles per attempt.
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Reconnect delay cap.
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// Reconnect attempts before the session is declared dead.
    #[serde(default = "default_reconnect_max_attempts")]
    pub reconnect_max_attempts: u32,

    /// Per-topic notification queue depth.
    #[serde(default = "default_subscription_buffer")]
    pub subscription_buffer: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_endpoint() -> String {
    "ws://localhost:9999/ws".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./jamscan_data")
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_true() -> bool {
    true
}

fn default_api_port() -> u16 {
    9980
}

fn default_call_timeout_ms() -> u64 {
    10_000
}

fn default_tick_interval_ms() -> u64 {
    1_000
}

fn default_reconnect_base_delay_ms() -> u64 {
    500
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_reconnect_max_attempts() -> u32 {
    10
}

fn default_subscription_buffer() -> usize {
    256
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl SyncConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path).map_err(|e| SyncError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, SyncError> {
        toml::from_str(s).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("SyncConfig is always serializable to TOML")
    }

    /// The RPC client settings derived from this configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            call_timeout: Duration::from_millis(self.call_timeout_ms),
            subscription_buffer: self.subscription_buffer,
            reconnect: ReconnectPolicy {
                base_delay: Duration::from_millis(self.reconnect_base_delay_ms),
                max_delay: Duration::from_millis(self.reconnect_max_delay_ms),
                max_attempts: self.reconnect_max_attempts,
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            data_dir: default_data_dir(),
            map_size: default_map_size(),
            enable_api: default_true(),
            api_port: default_api_port(),
            call_timeout_ms: default_call_timeout_ms(),
            tick_interval_ms: default_tick_interval_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_max_attempts: default_reconnect_max_attempts(),
            subscription_buffer: default_subscription_buffer(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = SyncConfig::default();
        let toml_str = config.to_toml_string();
        let parsed = SyncConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.endpoint, config.endpoint);
        assert_eq!(parsed.api_port, config.api_port);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = SyncConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.endpoint, "ws://localhost:9999/ws");
        assert_eq!(config.api_port, 9980);
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            endpoint = "ws://node.example:9999/ws"
            reconnect_max_attempts = 3
        "#;
        let config = SyncConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.endpoint, "ws://node.example:9999/ws");
        assert_eq!(config.reconnect_max_attempts, 3);
        assert_eq!(config.call_timeout_ms, 10_000); // default
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = SyncConfig::from_toml_file("/nonexistent/jamscan.toml");
        assert!(matches!(result, Err(SyncError::Config(_))));
    }

    #[test]
    fn client_config_carries_reconnect_policy() {
        let mut config = SyncConfig::default();
        config.reconnect_base_delay_ms = 250;
        config.reconnect_max_attempts = 4;
        let client = config.client_config();
        assert_eq!(client.reconnect.base_delay, Duration::from_millis(250));
        assert_eq!(client.reconnect.max_attempts, 4);
    }
}
