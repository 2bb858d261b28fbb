//! Configuration loader for Rendezvous.
//!
//! Reads `config.toml` from the data directory (`~/.rendezvous/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to sensible defaults
//! when the file is missing or malformed, then applies environment overrides.

use std::path::{Path, PathBuf};

use rendezvous_types::config::AppConfig;

use crate::sqlite::pool::default_database_url;

/// Load configuration from `{data_dir}/config.toml` plus environment overrides.
///
/// - If the file does not exist, starts from [`AppConfig::default()`].
/// - If the file exists but fails to parse, logs a warning and uses the default.
/// - `PORT`, `DATABASE_URL` and `MAP_SERVICE_URL` override the file.
pub async fn load_config(data_dir: &Path) -> AppConfig {
    let mut config = load_config_file(data_dir).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config
}

async fn load_config_file(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

/// Apply environment overrides using `lookup` to read variables.
pub fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(port) = lookup("PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORT value '{port}'"),
        }
    }
    if let Some(url) = lookup("DATABASE_URL").filter(|v| !v.is_empty()) {
        config.database.url = Some(url);
    }
    if let Some(url) = lookup("MAP_SERVICE_URL").filter(|v| !v.is_empty()) {
        config.map_service.url = url;
    }
}

/// The database URL to connect to: the configured one or the data directory default.
pub fn database_url(config: &AppConfig, data_dir: &Path) -> String {
    config
        .database
        .url
        .clone()
        .unwrap_or_else(|| default_database_url(data_dir))
}

/// Resolve the data directory from environment or platform defaults.
///
/// Priority:
/// 1. `RENDEZVOUS_DATA_DIR` environment variable
/// 2. `~/.rendezvous`
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("RENDEZVOUS_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".rendezvous");
    }

    // Last resort: current directory
    PathBuf::from(".rendezvous")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.server.port, 8001);
        assert_eq!(config.map_service.max_failures, 3);
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[server]
port = 9100

[map_service]
url = "http://maps:8002"
reset_timeout_ms = 10000

[messages]
default_page_size = 20
"#,
        )
        .await
        .unwrap();

        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.map_service.url, "http://maps:8002");
        assert_eq!(config.map_service.reset_timeout_ms, 10_000);
        assert_eq!(config.messages.default_page_size, 20);
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config_file(tmp.path()).await;
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn env_overrides_take_precedence() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PORT", "9000"),
            ("DATABASE_URL", "sqlite://other.db"),
            ("MAP_SERVICE_URL", "http://maps.test"),
        ]);
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.database.url.as_deref(), Some("sqlite://other.db"));
        assert_eq!(config.map_service.url, "http://maps.test");
    }

    #[test]
    fn invalid_port_override_is_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, |key| (key == "PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.server.port, 8001);
    }

    #[test]
    fn database_url_defaults_to_data_dir() {
        let config = AppConfig::default();
        let url = database_url(&config, Path::new("/data"));
        assert_eq!(url, "sqlite:///data/rendezvous.db?mode=rwc");
    }

    #[test]
    fn test_resolve_data_dir_from_env() {
        // SAFETY: This test is single-threaded and restores the env var immediately.
        unsafe {
            std::env::set_var("RENDEZVOUS_DATA_DIR", "/tmp/test-rendezvous");
        }
        let dir = resolve_data_dir();
        assert_eq!(dir, PathBuf::from("/tmp/test-rendezvous"));
        unsafe {
            std::env::remove_var("RENDEZVOUS_DATA_DIR");
        }
    }
}
