// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of PikoBridge.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod validation;

pub use validation::ValidationResult;

use anyhow::{Context, Result};
use piko_core::{RetryPolicy, StaleFieldPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Home Assistant add-on options
const ADDON_OPTIONS_PATH: &str = "/data/options.json";

/// Shortest accepted polling or retry interval
const MIN_INTERVAL_MS: u64 = 1000;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inverter connection
    #[serde(default)]
    pub inverter: InverterConfig,

    /// Poll timing and retry budget
    #[serde(default)]
    pub polling: PollingConfig,

    /// Where values are published
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub system: SystemConfig,

    /// Where this configuration was read from
    #[serde(skip)]
    pub source: ConfigSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// "http" or "https"
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// IP address or host name of the inverter
    #[serde(default)]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Full base URL, overrides protocol/host/port when set
    #[serde(default)]
    pub base_url: Option<String>,

    /// Request timeout for the status page (milliseconds)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            protocol: default_protocol(),
            host: String::new(),
            port: default_port(),
            base_url: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_protocol() -> String {
    "http".to_owned()
}

fn default_port() -> u16 {
    80
}

fn default_timeout_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Delay after a successful poll (milliseconds)
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Consecutive failed polls before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Delay after a failed poll (milliseconds)
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            max_retries: default_max_retries(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

fn default_interval_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_interval_ms() -> u64 {
    30_000
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    HomeAssistant,
    /// Keep values in memory and log them (dry run)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Home Assistant base URL (optional, defaults to supervisor)
    #[serde(default)]
    pub ha_base_url: Option<String>,

    /// Home Assistant token (optional, uses SUPERVISOR_TOKEN if not set)
    #[serde(default)]
    pub ha_token: Option<String>,

    /// Prefix of generated entity ids
    #[serde(default = "default_entity_prefix")]
    pub entity_prefix: String,

    /// What to do with objects of fields missing from the status page
    #[serde(default)]
    pub stale_fields: StaleFieldPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            ha_base_url: None,
            ha_token: None,
            entity_prefix: default_entity_prefix(),
            stale_fields: StaleFieldPolicy::default(),
        }
    }
}

fn default_entity_prefix() -> String {
    piko_ha::DEFAULT_ENTITY_PREFIX.to_owned()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Log at debug level unless RUST_LOG says otherwise
    #[serde(default)]
    pub debug_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    #[default]
    Environment,
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Environment => f.write_str("defaults with environment overrides"),
        }
    }
}

impl AppConfig {
    /// Load configuration from an explicit file, HA addon options or a local config file.
    ///
    /// Falls back to defaults with environment overrides when no file exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let config = Self::load_file(path)?;
            config.validate()?;
            return Ok(config);
        }

        for candidate in [ADDON_OPTIONS_PATH, "config.toml", "config.json"] {
            let candidate = Path::new(candidate);
            if candidate.exists() {
                let config = Self::load_file(candidate)?;
                config.validate()?;
                return Ok(config);
            }
        }

        let config = Self::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML or JSON file, chosen by extension
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let mut config: AppConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", path.display()))?,
        };
        config.source = ConfigSource::File(path.to_path_buf());
        Ok(config)
    }

    /// Defaults with environment variable overrides (development/testing)
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("PIKO_HOST") {
            self.inverter.host = host;
        }
        if let Some(protocol) = lookup("PIKO_PROTOCOL") {
            self.inverter.protocol = protocol;
        }
        if let Some(port) = lookup("PIKO_PORT").and_then(|v| v.parse().ok()) {
            self.inverter.port = port;
        }
        if let Some(timeout) = lookup("PIKO_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.inverter.timeout_ms = timeout;
        }
        if let Some(interval) = lookup("PIKO_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.polling.interval_ms = interval;
        }
        if let Some(retries) = lookup("PIKO_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.polling.max_retries = retries;
        }
        if let Some(interval) = lookup("PIKO_RETRY_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.polling.retry_interval_ms = interval;
        }

        // Override HA connection
        if let Some(url) = lookup("HA_BASE_URL") {
            self.store.ha_base_url = Some(url);
        }
        if let Some(token) = lookup("HA_TOKEN") {
            self.store.ha_token = Some(token);
        }

        if let Some(debug_mode) = lookup("DEBUG_MODE").and_then(|v| v.parse().ok()) {
            self.system.debug_mode = debug_mode;
        }
        self.source = ConfigSource::Environment;
    }

    /// Validate configuration with detailed error reporting
    pub fn validate_detailed(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        match &self.inverter.base_url {
            Some(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    result.add_error(
                        "inverter.base_url",
                        format!("Base URL '{url}' must start with http:// or https://"),
                    );
                }
            }
            None => {
                if !is_valid_host(&self.inverter.host) {
                    result.add_error(
                        "inverter.host",
                        format!(
                            "Server address '{}' is not valid - please check your settings (e.g. 192.168.0.20)",
                            self.inverter.host
                        ),
                    );
                }
                if !matches!(self.inverter.protocol.as_str(), "http" | "https") {
                    result.add_error(
                        "inverter.protocol",
                        format!(
                            "Invalid protocol '{}' (must be: http or https)",
                            self.inverter.protocol
                        ),
                    );
                }
                if self.inverter.port == 0 {
                    result.add_error("inverter.port", "Port must not be 0");
                }
            }
        }

        if self.inverter.timeout_ms == 0 {
            result.add_error("inverter.timeout_ms", "Request timeout must not be 0");
        } else if self.inverter.timeout_ms >= self.polling.interval_ms {
            result.add_warning(
                "inverter.timeout_ms",
                "Request timeout is not shorter than the polling interval",
            );
        }

        if self.polling.interval_ms < MIN_INTERVAL_MS {
            result.add_error(
                "polling.interval_ms",
                format!("Polling interval must be at least {MIN_INTERVAL_MS} ms"),
            );
        }
        if self.polling.retry_interval_ms < MIN_INTERVAL_MS {
            result.add_error(
                "polling.retry_interval_ms",
                format!("Retry interval must be at least {MIN_INTERVAL_MS} ms"),
            );
        }
        if self.polling.retry_interval_ms == self.polling.interval_ms {
            result.add_warning(
                "polling.retry_interval_ms",
                "Retry interval equals the polling interval; failed polls are retried at the normal pace",
            );
        }
        if self.polling.max_retries == 0 {
            result.add_warning(
                "polling.max_retries",
                "No retries configured; polling stops after the first failure",
            );
        }

        if self.store.backend == StoreBackend::HomeAssistant {
            if self.store.ha_token.is_none() && std::env::var("SUPERVISOR_TOKEN").is_err() {
                result.add_error(
                    "store.ha_token",
                    "Home Assistant token is required outside the Supervisor environment",
                );
            }
            if let Some(url) = &self.store.ha_base_url
                && !(url.starts_with("http://") || url.starts_with("https://"))
            {
                result.add_error(
                    "store.ha_base_url",
                    format!("Home Assistant URL '{url}' must start with http:// or https://"),
                );
            }
        }

        result
    }

    /// Validate configuration, failing on the first batch of errors
    pub fn validate(&self) -> Result<()> {
        let result = self.validate_detailed();
        if result.has_errors() {
            anyhow::bail!("Invalid configuration: {}", result.error_summary());
        }
        Ok(())
    }

    /// Base URL of the inverter web server
    pub fn base_url(&self) -> String {
        match &self.inverter.base_url {
            Some(url) => url.trim_end_matches('/').to_owned(),
            None => format!(
                "{}://{}:{}",
                self.inverter.protocol, self.inverter.host, self.inverter.port
            ),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.inverter.timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            steady_interval: Duration::from_millis(self.polling.interval_ms),
            retry_interval: Duration::from_millis(self.polling.retry_interval_ms),
            max_retries: self.polling.max_retries,
        }
    }

    pub fn is_debug_mode(&self) -> bool {
        self.system.debug_mode
    }
}

/// Device address rule: letters, digits and dots only
fn is_valid_host(host: &str) -> bool {
    !host.is_empty() && host.chars().all(|c| c.is_ascii_alphanumeric() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn valid_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.inverter.host = "192.168.0.20".to_owned();
        config.store.backend = StoreBackend::Memory;
        config
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.inverter.protocol, "http");
        assert_eq!(config.inverter.port, 80);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.polling.interval_ms, 10_000);
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.polling.retry_interval_ms, 30_000);
        assert_eq!(config.store.entity_prefix, "piko");
        assert_eq!(config.store.stale_fields, StaleFieldPolicy::Keep);
        assert!(!config.is_debug_mode());

        // No inverter address configured yet
        assert!(config.validate_detailed().has_error_for("inverter.host"));
    }

    #[test]
    fn test_valid_config_passes() {
        let config = valid_config();
        let result = config.validate_detailed();
        assert!(!result.has_errors(), "{:?}", result.errors);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_from_parts() {
        let mut config = valid_config();
        assert_eq!(config.base_url(), "http://192.168.0.20:80");

        config.inverter.protocol = "https".to_owned();
        config.inverter.port = 443;
        assert_eq!(config.base_url(), "https://192.168.0.20:443");
    }

    #[test]
    fn test_base_url_override() {
        let mut config = valid_config();
        config.inverter.host = String::new();
        config.inverter.base_url = Some("https://piko.local:8443/".to_owned());

        assert!(config.validate().is_ok());
        assert_eq!(config.base_url(), "https://piko.local:8443");
    }

    #[test]
    fn test_validate_invalid_host() {
        for host in ["", "192.168.0.20:80", "piko-inverter", "http://192.168.0.20"] {
            let mut config = valid_config();
            config.inverter.host = host.to_owned();
            assert!(
                config.validate_detailed().has_error_for("inverter.host"),
                "host '{host}' should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_host_names_with_dots() {
        let mut config = valid_config();
        config.inverter.host = "piko.local".to_owned();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_protocol_and_port() {
        let mut config = valid_config();
        config.inverter.protocol = "ftp".to_owned();
        config.inverter.port = 0;

        let result = config.validate_detailed();
        assert!(result.has_error_for("inverter.protocol"));
        assert!(result.has_error_for("inverter.port"));
    }

    #[test]
    fn test_validate_request_timeout() {
        let mut config = valid_config();
        config.inverter.timeout_ms = 0;
        assert!(config.validate_detailed().has_error_for("inverter.timeout_ms"));

        config.inverter.timeout_ms = config.polling.interval_ms;
        let result = config.validate_detailed();
        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.field == "inverter.timeout_ms"));
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let mut config = valid_config();
        config.inverter.base_url = Some("192.168.0.20".to_owned());
        assert!(config.validate_detailed().has_error_for("inverter.base_url"));
    }

    #[test]
    fn test_validate_interval_too_low() {
        let mut config = valid_config();
        config.polling.interval_ms = 500;
        config.polling.retry_interval_ms = 999;

        let result = config.validate_detailed();
        assert!(result.has_error_for("polling.interval_ms"));
        assert!(result.has_error_for("polling.retry_interval_ms"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equal_intervals_only_warn() {
        let mut config = valid_config();
        config.polling.interval_ms = 15_000;
        config.polling.retry_interval_ms = 15_000;

        let result = config.validate_detailed();
        assert!(!result.has_errors());
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.warnings[0].field, "polling.retry_interval_ms");
    }

    #[test]
    fn test_zero_retries_warns() {
        let mut config = valid_config();
        config.polling.max_retries = 0;

        let result = config.validate_detailed();
        assert!(!result.has_errors());
        assert!(result.warnings.iter().any(|w| w.field == "polling.max_retries"));
    }

    #[test]
    fn test_ha_backend_requires_token() {
        if std::env::var("SUPERVISOR_TOKEN").is_ok() {
            return;
        }
        let mut config = valid_config();
        config.store.backend = StoreBackend::HomeAssistant;
        assert!(config.validate_detailed().has_error_for("store.ha_token"));

        config.store.ha_token = Some("token".to_owned());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy() {
        let config = valid_config();
        let policy = config.retry_policy();

        assert_eq!(policy.steady_interval, Duration::from_secs(10));
        assert_eq!(policy.retry_interval, Duration::from_secs(30));
        assert_eq!(policy.max_retries, 3);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("PIKO_HOST", "10.0.0.7"),
            ("PIKO_PROTOCOL", "https"),
            ("PIKO_PORT", "8443"),
            ("PIKO_TIMEOUT_MS", "2500"),
            ("PIKO_INTERVAL_MS", "5000"),
            ("PIKO_MAX_RETRIES", "not-a-number"),
            ("PIKO_RETRY_INTERVAL_MS", "60000"),
            ("HA_TOKEN", "secret"),
            ("DEBUG_MODE", "true"),
        ]);

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| (*v).to_owned()));

        assert_eq!(config.base_url(), "https://10.0.0.7:8443");
        assert_eq!(config.request_timeout(), Duration::from_millis(2500));
        assert_eq!(config.polling.interval_ms, 5000);
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.polling.retry_interval_ms, 60_000);
        assert_eq!(config.store.ha_token.as_deref(), Some("secret"));
        assert!(config.is_debug_mode());
        assert_eq!(config.source, ConfigSource::Environment);
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[inverter]
host = "192.168.178.40"
timeout_ms = 3000

[polling]
interval_ms = 20000
max_retries = 5

[store]
backend = "memory"
stale_fields = "delete"
"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.base_url(), "http://192.168.178.40:80");
        assert_eq!(config.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.polling.interval_ms, 20_000);
        assert_eq!(config.polling.max_retries, 5);
        assert_eq!(config.polling.retry_interval_ms, 30_000);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.stale_fields, StaleFieldPolicy::Delete);
        assert_eq!(config.source, ConfigSource::File(file.path().to_path_buf()));
    }

    #[test]
    fn test_load_ha_addon_options() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "inverter": {{"protocol": "https", "host": "192.168.1.15", "port": 443}},
                "polling": {{"interval_ms": 10000, "max_retries": 3, "retry_interval_ms": 30000}},
                "store": {{"backend": "home_assistant", "ha_token": "abc", "entity_prefix": "roof"}},
                "system": {{"debug_mode": true}}
            }}"#
        )
        .unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.base_url(), "https://192.168.1.15:443");
        assert_eq!(config.store.entity_prefix, "roof");
        assert!(config.is_debug_mode());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[inverter]\nhost = \"bad host!\"\n[store]\nbackend = \"memory\"").unwrap();

        let err = AppConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("inverter.host"));
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(AppConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let config = valid_config();
        let toml_str = toml::to_string_pretty(&config).unwrap();

        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.base_url(), deserialized.base_url());
        assert_eq!(deserialized.store.backend, StoreBackend::Memory);
    }
}
