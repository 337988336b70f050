use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::orchestrator::UpdateConfig;
use crate::window::DEFAULT_WINDOW_SIZE;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub update: UpdateConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Server configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([127, 0, 0, 1])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Shows and settings share this file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("mediathek.db")
}

/// Result window configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ViewConfig {
    /// Rows made visible per fetch-more step.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Shows kept in the object cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_window_size() -> usize {
    DEFAULT_WINDOW_SIZE
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

/// Download configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Download targets are resolved relative to this directory.
    #[serde(default = "default_download_dir")]
    pub directory: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.path, PathBuf::from("mediathek.db"));
        assert_eq!(config.view.window_size, 256);
        assert_eq!(config.view.cache_capacity, 1024);
        assert_eq!(config.download.directory, PathBuf::from("downloads"));
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
[view]
window_size = 50

[update]
catalog_update_after_hours = 6
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.view.window_size, 50);
        assert_eq!(config.view.cache_capacity, 1024);
        assert_eq!(config.update.catalog_update_after_hours, 6);
        assert_eq!(config.update.mirror_list_update_after_days, 3);
    }

    #[test]
    fn test_config_serializes() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json["server"]["host"], "127.0.0.1");
        assert_eq!(json["update"]["update_interval_secs"], 3600);
    }
}
