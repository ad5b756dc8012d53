use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;
pub mod plugin;

use defaults::*;
use duration_serde::parse_default;

pub use plugin::{EpgLanguage, PluginConfig, RawPluginSettings, UrlDialect};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Outbound connection settings shared by every proxied stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Time allowed to establish the provider connection
    #[serde(with = "duration_serde::duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    /// Maximum silence between two body chunks before the stream is dropped
    #[serde(with = "duration_serde::duration", default = "default_idle_read_timeout")]
    pub idle_read_timeout: Duration,
    /// Upper bound of a single relayed body chunk in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Number of characters of an upstream error body kept for logs
    #[serde(default = "default_error_body_preview_bytes")]
    pub error_body_preview_bytes: usize,
    /// User-Agent used when the account does not define one
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// JSON snapshot of accounts, streams, channels, users and programs
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,
    /// TOML file holding the runtime plugin settings
    #[serde(default = "default_settings_path")]
    pub settings_path: PathBuf,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> Duration {
    parse_default(DEFAULT_CONNECT_TIMEOUT, 15)
}

fn default_idle_read_timeout() -> Duration {
    parse_default(DEFAULT_IDLE_READ_TIMEOUT, 30)
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_error_body_preview_bytes() -> usize {
    DEFAULT_ERROR_BODY_PREVIEW_BYTES
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from(DEFAULT_CATALOG_PATH)
}

fn default_settings_path() -> PathBuf {
    PathBuf::from(DEFAULT_SETTINGS_PATH)
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            idle_read_timeout: default_idle_read_timeout(),
            chunk_size: default_chunk_size(),
            error_body_preview_bytes: default_error_body_preview_bytes(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            settings_path: default_settings_path(),
        }
    }
}

impl UpstreamConfig {
    /// Chunk size with a floor of one byte so rechunking always progresses
    pub fn effective_chunk_size(&self) -> usize {
        self.chunk_size.max(1)
    }
}

impl Config {
    pub fn load_from_file(config_file: &str) -> Result<Self> {
        if std::path::Path::new(&config_file).exists() {
            let contents = std::fs::read_to_string(config_file)?;
            Ok(toml::from_str(&contents)?)
        } else {
            let default_config = Self::default();
            let contents = toml::to_string_pretty(&default_config)?;
            std::fs::write(config_file, contents)?;
            info!("Created default config file: {}", config_file);
            Ok(default_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.web.port, DEFAULT_PORT);
        assert_eq!(config.upstream.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.upstream.idle_read_timeout, Duration::from_secs(30));
        assert_eq!(config.upstream.chunk_size, 8192);
        assert_eq!(config.upstream.error_body_preview_bytes, 200);
        assert_eq!(
            config.storage.catalog_path,
            PathBuf::from(DEFAULT_CATALOG_PATH)
        );
    }

    #[test]
    fn test_partial_sections() {
        let config: Config = toml::from_str(
            r#"
            [web]
            port = 9191

            [upstream]
            connect_timeout = "5s"
            chunk_size = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.web.host, DEFAULT_HOST);
        assert_eq!(config.web.port, 9191);
        assert_eq!(config.upstream.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.upstream.effective_chunk_size(), 1);
        assert_eq!(config.upstream.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_load_from_file_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let path_str = path.to_string_lossy().to_string();

        let config = Config::load_from_file(&path_str).unwrap();
        assert!(path.exists());
        assert_eq!(config.web.port, DEFAULT_PORT);

        let reloaded = Config::load_from_file(&path_str).unwrap();
        assert_eq!(reloaded.upstream.connect_timeout, config.upstream.connect_timeout);
    }
}
