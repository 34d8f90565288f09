//! Configuration management for the rate-limit module
//!
//! Parses TOML (or Caddy-style JSON) configuration files and provides typed
//! access to zones, the metrics policy and background refresh settings.

use crate::error::{AppError, AppResult};
use crate::window::Window;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Upper bound for the key count refresh interval
const MAX_REFRESH_INTERVAL_SECONDS: u64 = 3600;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Rate-limit zones keyed by zone name
    ///
    /// Zone names are used verbatim as metric labels.
    #[serde(default, alias = "rate_limits")]
    pub zones: BTreeMap<String, ZoneConfig>,
}

/// Metrics policy
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    /// Record metrics at all. When false the limiter runs without a collector.
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    /// Emit per-key series in addition to zone aggregates
    #[serde(default)]
    pub include_key: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            include_key: false,
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Background refresh settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshConfig {
    #[serde(default = "default_key_count_interval")]
    key_count_interval_seconds: u64,
}

impl RefreshConfig {
    pub fn new(key_count_interval_seconds: u64) -> AppResult<Self> {
        let config = Self {
            key_count_interval_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    /// How often each zone's key count gauge is refreshed
    pub fn key_count_interval(&self) -> Duration {
        Duration::from_secs(self.key_count_interval_seconds)
    }

    fn validate(&self) -> AppResult<()> {
        if self.key_count_interval_seconds == 0
            || self.key_count_interval_seconds > MAX_REFRESH_INTERVAL_SECONDS
        {
            return Err(AppError::Config(format!(
                "refresh.key_count_interval_seconds must be in (0, {}], got {}",
                MAX_REFRESH_INTERVAL_SECONDS, self.key_count_interval_seconds
            )));
        }
        Ok(())
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            key_count_interval_seconds: default_key_count_interval(),
        }
    }
}

fn default_key_count_interval() -> u64 {
    10
}

/// A single rate-limit zone
///
/// Fields are private; values are validated by [`Config::validate`] or
/// [`ZoneConfig::new`]. Other limiter settings (matchers, distributed state)
/// may appear alongside these and are ignored here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ZoneConfig {
    key: String,
    window: Window,
    max_events: u64,
}

impl ZoneConfig {
    pub fn new(key: impl Into<String>, window: Window, max_events: u64) -> AppResult<Self> {
        let zone = Self {
            key: key.into(),
            window,
            max_events,
        };
        zone.validate("<unnamed>")?;
        Ok(zone)
    }

    /// Key template used by the limiter to discriminate clients
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn max_events(&self) -> u64 {
        self.max_events
    }

    fn validate(&self, zone_name: &str) -> AppResult<()> {
        if self.key.is_empty() {
            return Err(AppError::Config(format!(
                "zone '{}' must define a key",
                zone_name
            )));
        }
        if self.max_events == 0 {
            return Err(AppError::Config(format!(
                "zone '{}' has max_events=0; max_events must be greater than 0",
                zone_name
            )));
        }
        if self.window.is_zero() {
            return Err(AppError::Config(format!(
                "zone '{}' has a zero window; window must be greater than 0",
                zone_name
            )));
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from a file
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        let path_display = path.display().to_string();

        let content =
            std::fs::read_to_string(path).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config: Self = if is_json {
            serde_json::from_str(&content).map_err(|source| AppError::ConfigJsonParseFailed {
                path: path_display.clone(),
                source,
            })?
        } else {
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?
        };

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        tracing::debug!(
            path = %path.display(),
            zones = config.zones.len(),
            include_key = config.metrics.include_key,
            "Loaded rate limit configuration"
        );

        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> AppResult<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| AppError::Config(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all zones and refresh settings
    ///
    /// Zone names are deliberately not checked; they are opaque metric labels.
    pub fn validate(&self) -> AppResult<()> {
        for (name, zone) in &self.zones {
            zone.validate(name)?;
        }
        self.refresh.validate()?;
        Ok(())
    }
}
