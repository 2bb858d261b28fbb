//! Configuration types for Rendezvous.
//!
//! `AppConfig` mirrors the `config.toml` file in the data directory. Every
//! field has a default, so an empty or missing file yields a working setup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub map_service: MapServiceConfig,
    #[serde(default)]
    pub messages: MessagesConfig,
    #[serde(default)]
    pub realtime: RealtimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database settings. `url = None` means "use the data directory default".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
}

/// Settings for the external geolocation (map) service and its breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapServiceConfig {
    #[serde(default = "default_map_url")]
    pub url: String,
    /// Per-call timeout; a timed-out call counts as a failure.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    /// How long an open circuit sheds calls before letting one through.
    #[serde(default = "default_reset_timeout_ms")]
    pub reset_timeout_ms: u64,
}

fn default_map_url() -> String {
    "http://localhost:8002".to_string()
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_max_failures() -> u32 {
    3
}

fn default_reset_timeout_ms() -> u64 {
    30_000
}

impl MapServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for MapServiceConfig {
    fn default() -> Self {
        Self {
            url: default_map_url(),
            timeout_ms: default_timeout_ms(),
            max_failures: default_max_failures(),
            reset_timeout_ms: default_reset_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

fn default_page_size() -> u32 {
    10
}

fn default_max_page_size() -> u32 {
    100
}

impl MessagesConfig {
    /// Resolve a requested page size against the configured bounds.
    pub fn clamp_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Outbound events buffered per connection before new ones are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

fn default_outbound_buffer() -> usize {
    256
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.map_service.max_failures, 3);
        assert_eq!(config.map_service.reset_timeout(), Duration::from_secs(30));
        assert_eq!(config.map_service.timeout(), Duration::from_secs(5));
        assert_eq!(config.messages.default_page_size, 10);
        assert!(config.database.url.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
[server]
port = 9000

[map_service]
url = "http://maps.internal"
max_failures = 5
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.map_service.url, "http://maps.internal");
        assert_eq!(config.map_service.max_failures, 5);
        assert_eq!(config.map_service.reset_timeout_ms, 30_000);
        assert_eq!(config.realtime.outbound_buffer, 256);
    }

    #[test]
    fn test_room_capacity_is_not_configurable() {
        let config: AppConfig = toml::from_str(
            r#"
[rooms]
capacity = 3
"#,
        )
        .unwrap();
        let value = serde_json::to_value(&config).unwrap();
        assert!(value.get("rooms").is_none());
    }

    #[test]
    fn test_clamp_limit() {
        let messages = MessagesConfig::default();
        assert_eq!(messages.clamp_limit(None), 10);
        assert_eq!(messages.clamp_limit(Some(0)), 1);
        assert_eq!(messages.clamp_limit(Some(25)), 25);
        assert_eq!(messages.clamp_limit(Some(10_000)), 100);
    }
}
