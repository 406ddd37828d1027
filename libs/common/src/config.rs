//! Client configuration
//!
//! This module assembles the runtime configuration for the client from
//! built-in defaults overlaid with `KURSO_*` environment variables, e.g.
//! `KURSO_BASE_URL` or `KURSO_SESSION_TIMEOUT_SECS`.

use crate::error::ConfigError;
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Runtime configuration for the client
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the backend (e.g., "https://api.kurso.app")
    pub base_url: String,
    /// API version segment used when assembling request URLs
    pub api_version: String,
    /// Timeout applied to every outgoing HTTP request, in seconds
    pub request_timeout_secs: u64,
    /// Inactivity window after which the session expires, in seconds
    pub session_timeout_secs: u64,
    /// WebSocket endpoint for the real-time channel
    pub realtime_url: String,
    /// How often the session monitor checks for expiry, in seconds
    pub monitor_interval_secs: u64,
    /// Directory where persisted session state is written
    pub storage_dir: String,
    /// Maximum log level ("trace" ... "error")
    pub log_level: String,
}

impl ClientConfig {
    /// Load the configuration from defaults and `KURSO_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("base_url", "http://localhost:3000")?
            .set_default("api_version", "v1")?
            .set_default("request_timeout_secs", 30_i64)?
            .set_default("session_timeout_secs", 1800_i64)?
            .set_default("realtime_url", "ws://localhost:3000/ws")?
            .set_default("monitor_interval_secs", 60_i64)?
            .set_default("storage_dir", ".kurso")?
            .set_default("log_level", "info")?
            .add_source(Environment::with_prefix("KURSO").try_parsing(true))
            .build()?;

        let config = settings.try_deserialize::<ClientConfig>()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "request_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        if self.session_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "session_timeout_secs",
                message: "must be positive".to_string(),
            });
        }
        // interval() panics on a zero period
        if self.monitor_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "monitor_interval_secs",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Timeout applied to every outgoing HTTP request
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Inactivity window after which the session expires
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    /// Interval between session monitor sweeps
    pub fn monitor_interval(&self) -> Duration {
        Duration::from_secs(self.monitor_interval_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            api_version: "v1".to_string(),
            request_timeout_secs: 30,
            session_timeout_secs: 1800,
            realtime_url: "ws://localhost:3000/ws".to_string(),
            monitor_interval_secs: 60,
            storage_dir: ".kurso".to_string(),
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn load_uses_defaults_when_env_is_empty() {
        let config = ClientConfig::load().expect("Failed to load client config");
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.api_version, "v1");
        assert_eq!(config.session_timeout(), Duration::from_secs(1800));
        assert_eq!(config.monitor_interval(), Duration::from_secs(60));
    }

    #[test]
    #[serial]
    fn environment_variables_override_defaults() {
        unsafe {
            std::env::set_var("KURSO_BASE_URL", "https://staging.kurso.app");
            std::env::set_var("KURSO_REQUEST_TIMEOUT_SECS", "5");
        }

        let config = ClientConfig::load().expect("Failed to load client config");

        unsafe {
            std::env::remove_var("KURSO_BASE_URL");
            std::env::remove_var("KURSO_REQUEST_TIMEOUT_SECS");
        }

        assert_eq!(config.base_url, "https://staging.kurso.app");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    #[serial]
    fn zero_durations_are_rejected() {
        unsafe {
            std::env::set_var("KURSO_MONITOR_INTERVAL_SECS", "0");
        }

        let result = ClientConfig::load();

        unsafe {
            std::env::remove_var("KURSO_MONITOR_INTERVAL_SECS");
        }

        assert!(matches!(
            result,
            Err(ConfigError::Invalid {
                field: "monitor_interval_secs",
                ..
            })
        ));
    }
}
