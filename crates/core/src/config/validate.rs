use super::{types::Config, ConfigError};

/// Ten years.
const MAX_MIRROR_LIST_AGE_DAYS: i64 = 3650;
const MAX_CATALOG_AGE_HOURS: i64 = MAX_MIRROR_LIST_AGE_DAYS * 24;

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - View window and cache sizes are positive
/// - Update thresholds are within 0..=10 years and the interval is positive
/// - Mirror list URL is http(s) and the user agent is set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    // View validation
    if config.view.window_size == 0 {
        return Err(invalid("view.window_size must be positive"));
    }
    if config.view.cache_capacity == 0 {
        return Err(invalid("view.cache_capacity must be positive"));
    }

    // Update validation
    let update = &config.update;
    if !(0..=MAX_MIRROR_LIST_AGE_DAYS).contains(&update.mirror_list_update_after_days) {
        return Err(ConfigError::ValidationError(format!(
            "update.mirror_list_update_after_days must be between 0 and {}",
            MAX_MIRROR_LIST_AGE_DAYS
        )));
    }
    if !(0..=MAX_CATALOG_AGE_HOURS).contains(&update.catalog_update_after_hours) {
        return Err(ConfigError::ValidationError(format!(
            "update.catalog_update_after_hours must be between 0 and {}",
            MAX_CATALOG_AGE_HOURS
        )));
    }
    if update.update_interval_secs == 0 {
        return Err(invalid("update.update_interval_secs must be positive"));
    }
    if !(update.mirror_list_url.starts_with("http://")
        || update.mirror_list_url.starts_with("https://"))
    {
        return Err(ConfigError::ValidationError(format!(
            "update.mirror_list_url must be an http(s) URL, got '{}'",
            update.mirror_list_url
        )));
    }
    if update.user_agent.trim().is_empty() {
        return Err(invalid("update.user_agent cannot be empty"));
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ServerConfig, ViewConfig};
    use crate::orchestrator::UpdateConfig;
    use std::net::IpAddr;

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let config = Config {
            server: ServerConfig {
                host: "0.0.0.0".parse::<IpAddr>().unwrap(),
                port: 0,
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_zero_window_fails() {
        let config = Config {
            view: ViewConfig {
                window_size: 0,
                cache_capacity: 1024,
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_update_section() {
        let config = Config {
            update: UpdateConfig {
                mirror_list_url: "ftp://mirrors.example/akt.xml".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("mirror_list_url"));

        let config = Config {
            update: UpdateConfig {
                catalog_update_after_hours: -1,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());

        let config = Config {
            update: UpdateConfig {
                update_interval_secs: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_threshold_upper_bound() {
        let config = Config {
            update: UpdateConfig {
                mirror_list_update_after_days: i64::MAX,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("mirror_list_update_after_days"));

        let config = Config {
            update: UpdateConfig {
                catalog_update_after_hours: MAX_CATALOG_AGE_HOURS + 1,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("catalog_update_after_hours"));

        let config = Config {
            update: UpdateConfig {
                mirror_list_update_after_days: MAX_MIRROR_LIST_AGE_DAYS,
                catalog_update_after_hours: MAX_CATALOG_AGE_HOURS,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }
}
