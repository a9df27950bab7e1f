//! Dashboard configuration using Figment
//!
//! Configuration is loaded from:
//! 1. Built-in defaults (see [`DashboardConfig::default`])
//! 2. `config/pico_sync.toml` (optional)
//! 3. Environment variables (prefixed with `PICO_SYNC_`)
//!
//! # Example
//! ```no_run
//! use pico_sync::config::DashboardConfig;
//!
//! let config = DashboardConfig::load()?;
//! println!("Polling every {:?}", config.poll_interval());
//! # Ok::<(), pico_sync::error::SyncError>(())
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::snapshot::TreePath;

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/pico_sync.toml";

/// Accepted poll interval range. Observed dashboards poll every 100-500 ms.
pub const POLL_INTERVAL_RANGE_MS: RangeInclusive<u64> = 50..=5_000;

/// Name of the digitizer adapter in the backend's REST API.
pub const ADAPTER_NAME: &str = "pico";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level dashboard configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Delay between the end of one snapshot response and the next request
    pub poll_interval_ms: u64,
    /// Idle period after which a focused field is forcibly blurred
    pub idle_timeout_ms: u64,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (pretty, compact, json)
    pub log_format: String,
    /// Backend API version, the `{version}` in `/api/{version}/pico/...`
    pub api_version: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 150,
            idle_timeout_ms: 10_000,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            api_version: "0.1".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Load configuration from `config/pico_sync.toml` and environment variables
    ///
    /// Environment variables override the file, e.g. `PICO_SYNC_POLL_INTERVAL_MS=250`.
    pub fn load() -> SyncResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// A missing file is not an error; the defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> SyncResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("PICO_SYNC_"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> SyncResult<()> {
        if !POLL_INTERVAL_RANGE_MS.contains(&self.poll_interval_ms) {
            return Err(SyncError::Configuration(format!(
                "Invalid poll_interval_ms {}. Must be {}-{}",
                self.poll_interval_ms,
                POLL_INTERVAL_RANGE_MS.start(),
                POLL_INTERVAL_RANGE_MS.end()
            )));
        }

        if self.idle_timeout_ms == 0 {
            return Err(SyncError::Configuration(
                "idle_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if !VALID_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(SyncError::Configuration(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LEVELS.join(", ")
            )));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(SyncError::Configuration(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.log_format,
                valid_formats.join(", ")
            )));
        }

        if self.api_version.trim().is_empty() {
            return Err(SyncError::Configuration(
                "api_version cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Idle timeout as a `Duration`
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// REST URL of a parameter-tree node, e.g. `/api/0.1/pico/device/settings/file`
    pub fn adapter_url(&self, path: &TreePath) -> String {
        let base = format!("/api/{}/{ADAPTER_NAME}/", self.api_version.trim());
        format!("{base}{}", path.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.poll_interval(), Duration::from_millis(150));
    }

    #[test]
    fn test_poll_interval_out_of_range() {
        let config = DashboardConfig {
            poll_interval_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = DashboardConfig {
            poll_interval_ms: 60_000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let config = DashboardConfig {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Invalid log_level 'verbose'"));
    }

    #[test]
    fn test_log_level_case_insensitive() {
        let config = DashboardConfig {
            log_level: "DEBUG".to_string(),
            log_format: "Json".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_idle_timeout_rejected() {
        let config = DashboardConfig {
            idle_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_adapter_url_uses_api_version() {
        let config = DashboardConfig {
            api_version: "0.2".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.adapter_url(&TreePath::new("device/settings/file")),
            "/api/0.2/pico/device/settings/file"
        );
        assert_eq!(DashboardConfig::default().adapter_url(&TreePath::new("")), "/api/0.1/pico/");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: DashboardConfig = toml::from_str("poll_interval_ms = 500").unwrap();
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.idle_timeout_ms, 10_000);
        assert_eq!(config.api_version, "0.1");
    }
}
