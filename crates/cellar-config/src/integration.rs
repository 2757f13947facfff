//! Typed configuration sections
//!
//! Parses the `cellar_tracker:` and `http:` sections of configuration.yaml.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use cellar_core::{WineKeyStyle, DOMAIN};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Poll interval used when none is configured (one hour)
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 3600;
/// Shortest accepted poll interval
pub const MIN_SCAN_INTERVAL_SECS: u64 = 30;
/// Fetch timeout used when none is configured
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
/// Longest accepted fetch timeout
pub const MAX_FETCH_TIMEOUT_SECS: u64 = 60;
/// Unit of the total value sensor when none is configured
pub const DEFAULT_CURRENCY: &str = "EUR";

/// Settings for one CellarTracker account
#[derive(Clone, Serialize, Deserialize)]
pub struct CellarConfig {
    pub username: String,
    pub password: String,

    /// Poll interval in seconds
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    /// Upper bound on one inventory download, in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,

    /// Group wines by vintage, name and bottle size instead of vintage and name
    #[serde(default)]
    pub include_size_in_key: bool,

    /// Unit reported by the total value sensor
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Override of the CellarTracker base URL
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_scan_interval() -> u64 {
    DEFAULT_SCAN_INTERVAL_SECS
}

fn default_fetch_timeout() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

impl CellarConfig {
    /// Create a config with default settings for the given account
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            scan_interval: DEFAULT_SCAN_INTERVAL_SECS,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT_SECS,
            include_size_in_key: false,
            currency: default_currency(),
            base_url: None,
        }
    }

    /// Poll interval, never shorter than [`MIN_SCAN_INTERVAL_SECS`]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval.max(MIN_SCAN_INTERVAL_SECS))
    }

    /// Fetch timeout, clamped to 1..=[`MAX_FETCH_TIMEOUT_SECS`] seconds
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout.clamp(1, MAX_FETCH_TIMEOUT_SECS))
    }

    /// Grouping key style for the aggregator
    pub fn wine_key_style(&self) -> WineKeyStyle {
        if self.include_size_in_key {
            WineKeyStyle::VintageWineSize
        } else {
            WineKeyStyle::VintageWine
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        for (key, value) in [("username", &self.username), ("password", &self.password)] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("{DOMAIN}.{key}"),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CellarConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellarConfig")
            .field("username", &self.username)
            .field("password", &"**REDACTED**")
            .field("scan_interval", &self.scan_interval)
            .field("fetch_timeout", &self.fetch_timeout)
            .field("include_size_in_key", &self.include_size_in_key)
            .field("currency", &self.currency)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// HTTP API settings from the `http:` section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8124
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: default_server_port(),
        }
    }
}

impl ServerConfig {
    /// Socket address to bind, as `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

/// Everything read from configuration.yaml
#[derive(Debug, Clone)]
pub struct Config {
    pub cellar_tracker: CellarConfig,
    pub http: ServerConfig,
}

impl Config {
    /// Load configuration.yaml from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(config_dir.as_ref(), "configuration.yaml")?;
        Self::from_yaml(&yaml)
    }

    /// Parse the known sections from an already loaded document
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        let mapping = yaml.as_mapping().ok_or_else(|| ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: "configuration must be a mapping".to_string(),
        })?;

        let section = mapping
            .get(&Value::String(DOMAIN.to_string()))
            .cloned()
            .ok_or_else(|| ConfigError::MissingSection {
                section: DOMAIN.to_string(),
            })?;
        let cellar_tracker: CellarConfig =
            serde_yaml::from_value(section).map_err(|e| ConfigError::InvalidValue {
                key: DOMAIN.to_string(),
                reason: e.to_string(),
            })?;
        cellar_tracker.validate()?;

        let http = match mapping.get(&Value::String("http".to_string())) {
            Some(Value::Null) | None => ServerConfig::default(),
            Some(section) => serde_yaml::from_value(section.clone()).map_err(|e| {
                ConfigError::InvalidValue {
                    key: "http".to_string(),
                    reason: e.to_string(),
                }
            })?,
        };

        Ok(Self {
            cellar_tracker,
            http,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(yaml: &str) -> ConfigResult<Config> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Config::from_yaml(&value)
    }

    #[test]
    fn test_defaults() {
        let config = parse("cellar_tracker:\n  username: me\n  password: pw\n").unwrap();
        let cellar = &config.cellar_tracker;
        assert_eq!(cellar.scan_interval(), Duration::from_secs(3600));
        assert_eq!(cellar.fetch_timeout(), Duration::from_secs(10));
        assert_eq!(cellar.wine_key_style(), WineKeyStyle::VintageWine);
        assert_eq!(cellar.currency, "EUR");
        assert!(cellar.base_url.is_none());
        assert_eq!(config.http.bind_addr(), "0.0.0.0:8124");
    }

    #[test]
    fn test_scan_interval_is_clamped() {
        let config = parse(
            "cellar_tracker:\n  username: me\n  password: pw\n  scan_interval: 5\n",
        )
        .unwrap();
        assert_eq!(config.cellar_tracker.scan_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_fetch_timeout_is_clamped() {
        let mut cellar = CellarConfig::new("me", "pw");
        cellar.fetch_timeout = 0;
        assert_eq!(cellar.fetch_timeout(), Duration::from_secs(1));
        cellar.fetch_timeout = 600;
        assert_eq!(cellar.fetch_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_size_in_key() {
        let config = parse(
            "cellar_tracker:\n  username: me\n  password: pw\n  include_size_in_key: true\n",
        )
        .unwrap();
        assert_eq!(
            config.cellar_tracker.wine_key_style(),
            WineKeyStyle::VintageWineSize
        );
    }

    #[test]
    fn test_http_section() {
        let config = parse(
            "cellar_tracker:\n  username: me\n  password: pw\nhttp:\n  server_port: 9000\n",
        )
        .unwrap();
        assert_eq!(config.http.server_port, 9000);
        assert_eq!(config.http.server_host, "0.0.0.0");
    }

    #[test]
    fn test_missing_section() {
        let result = parse("http:\n  server_port: 9000\n");
        assert!(matches!(result, Err(ConfigError::MissingSection { .. })));
    }

    #[test]
    fn test_missing_password() {
        let result = parse("cellar_tracker:\n  username: me\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_empty_username() {
        let result = parse("cellar_tracker:\n  username: ''\n  password: pw\n");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_debug_redacts_password() {
        let cellar = CellarConfig::new("me", "hunter2");
        let printed = format!("{:?}", cellar);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("me"));
    }

    #[test]
    fn test_load_with_secrets() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("secrets.yaml"),
            "cellar_user: sommelier\ncellar_password: 123456\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("configuration.yaml"),
            "cellar_tracker:\n  username: !secret cellar_user\n  password: !secret cellar_password\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.cellar_tracker.username, "sommelier");
        assert_eq!(config.cellar_tracker.password, "123456");
    }
}
