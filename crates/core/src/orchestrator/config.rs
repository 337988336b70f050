//! Update orchestrator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::fetch::HttpFetcherConfig;
use crate::mirror::DEFAULT_MIRROR_LIST_URL;

/// Configuration for the update orchestrator (`[update]` section).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateConfig {
    /// Run the periodic staleness check.
    /// When disabled, updates only happen on manual request.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Where the mirror list document is published.
    #[serde(default = "default_mirror_list_url")]
    pub mirror_list_url: String,

    /// Refetch the mirror list once it is older than this many days.
    #[serde(default = "default_mirror_list_update_after_days")]
    pub mirror_list_update_after_days: i64,

    /// Refetch the catalog once it is older than this many hours.
    #[serde(default = "default_catalog_update_after_hours")]
    pub catalog_update_after_hours: i64,

    /// How often the periodic loop checks staleness (seconds).
    #[serde(default = "default_update_interval")]
    pub update_interval_secs: u64,

    /// User agent for mirror list, catalog and download requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Connect timeout for outgoing requests (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_mirror_list_url() -> String {
    DEFAULT_MIRROR_LIST_URL.to_string()
}

fn default_mirror_list_update_after_days() -> i64 {
    3
}

fn default_catalog_update_after_hours() -> i64 {
    3
}

fn default_update_interval() -> u64 {
    3600 // 1 hour
}

fn default_user_agent() -> String {
    concat!("mediathek/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            mirror_list_url: default_mirror_list_url(),
            mirror_list_update_after_days: default_mirror_list_update_after_days(),
            catalog_update_after_hours: default_catalog_update_after_hours(),
            update_interval_secs: default_update_interval(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

impl UpdateConfig {
    /// `None` when the threshold does not fit a duration; such a mirror
    /// list only goes stale when it is absent.
    pub fn mirror_list_max_age(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_days(self.mirror_list_update_after_days)
    }

    pub fn catalog_max_age(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_hours(self.catalog_update_after_hours)
    }

    /// HTTP client settings for all outgoing requests.
    pub fn fetcher_config(&self) -> HttpFetcherConfig {
        HttpFetcherConfig {
            user_agent: self.user_agent.clone(),
            connect_timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetcher_config() {
        let config = UpdateConfig {
            user_agent: "test-agent".to_string(),
            timeout_secs: 5,
            ..Default::default()
        };
        let fetcher = config.fetcher_config();
        assert_eq!(fetcher.user_agent, "test-agent");
        assert_eq!(fetcher.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_default_config() {
        let config = UpdateConfig::default();
        assert!(config.enabled);
        assert_eq!(
            config.mirror_list_url,
            "http://zdfmediathk.sourceforge.net/akt.xml"
        );
        assert_eq!(config.mirror_list_update_after_days, 3);
        assert_eq!(config.catalog_update_after_hours, 3);
        assert_eq!(config.update_interval_secs, 3600);
        assert!(config.user_agent.starts_with("mediathek/"));
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: UpdateConfig = toml::from_str("enabled = false").unwrap();
        assert!(!config.enabled);
        assert_eq!(config.catalog_update_after_hours, 3);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            enabled = true
            mirror_list_url = "http://mirrors.example/akt.xml"
            mirror_list_update_after_days = 7
            catalog_update_after_hours = 12
            update_interval_secs = 600
            user_agent = "test-agent"
            timeout_secs = 5
        "#;
        let config: UpdateConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mirror_list_url, "http://mirrors.example/akt.xml");
        assert_eq!(config.mirror_list_max_age(), Some(chrono::Duration::days(7)));
        assert_eq!(config.catalog_max_age(), Some(chrono::Duration::hours(12)));
        assert_eq!(config.update_interval_secs, 600);
        assert_eq!(config.user_agent, "test-agent");
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn test_out_of_range_threshold_has_no_max_age() {
        let config = UpdateConfig {
            mirror_list_update_after_days: i64::MAX,
            catalog_update_after_hours: i64::MAX,
            ..Default::default()
        };
        assert_eq!(config.mirror_list_max_age(), None);
        assert_eq!(config.catalog_max_age(), None);
    }
}
