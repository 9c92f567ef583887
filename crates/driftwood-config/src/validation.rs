// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semantic checks that serde attributes cannot express.

use crate::diagnostic::ConfigError;
use crate::model::DriftwoodConfig;

/// Allowed range for `agent.max_steps`.
pub const MAX_STEPS_RANGE: std::ops::RangeInclusive<u32> = 1..=30;

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &DriftwoodConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !MAX_STEPS_RANGE.contains(&config.agent.max_steps) {
        errors.push(ConfigError::Validation {
            message: format!(
                "agent.max_steps must be between {} and {}, got {}",
                MAX_STEPS_RANGE.start(),
                MAX_STEPS_RANGE.end(),
                config.agent.max_steps
            ),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.bottle.capacity < 1 {
        errors.push(ConfigError::Validation {
            message: "bottle.capacity must be at least 1".to_string(),
        });
    }

    if config.bottle.store_key.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "bottle.store_key must not be empty".to_string(),
        });
    }

    if config.scheduler.max_idle_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "scheduler.max_idle_secs must be at least 1".to_string(),
        });
    }

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "gateway.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("gateway.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.gateway.stream_buffer == 0 {
        errors.push(ConfigError::Validation {
            message: "gateway.stream_buffer must be at least 1".to_string(),
        });
    }

    for (key, url) in [
        ("weather.geocoding_url", &config.weather.geocoding_url),
        ("weather.forecast_url", &config.weather.forecast_url),
    ] {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            errors.push(ConfigError::Validation {
                message: format!("{key} must be an http(s) URL, got `{url}`"),
            });
        }
    }

    if config.weather.timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "weather.timeout_secs must be at least 1".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_message(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = DriftwoodConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn max_steps_out_of_range_fails() {
        let mut config = DriftwoodConfig::default();
        config.agent.max_steps = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "agent.max_steps"));

        config.agent.max_steps = 31;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "agent.max_steps"));

        config.agent.max_steps = 30;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_capacity_fails() {
        let mut config = DriftwoodConfig::default();
        config.bottle.capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "bottle.capacity"));
    }

    #[test]
    fn empty_host_fails() {
        let mut config = DriftwoodConfig::default();
        config.gateway.host = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "gateway.host"));
    }

    #[test]
    fn non_http_url_fails() {
        let mut config = DriftwoodConfig::default();
        config.weather.forecast_url = "ftp://example.com".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_message(&errors, "weather.forecast_url"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = DriftwoodConfig::default();
        config.agent.max_steps = 99;
        config.bottle.capacity = 0;
        config.storage.database_path = String::new();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn valid_custom_config_passes() {
        let mut config = DriftwoodConfig::default();
        config.gateway.host = "0.0.0.0".to_string();
        config.storage.database_path = "/tmp/test.db".to_string();
        config.bottle.capacity = 5;
        config.weather.geocoding_url = "http://localhost:8080/v1/search".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
