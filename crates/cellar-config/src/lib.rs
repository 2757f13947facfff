//! YAML configuration loading for the CellarTracker integration
//!
//! Configuration lives in `configuration.yaml` inside a config directory:
//!
//! ```yaml
//! cellar_tracker:
//!   username: !secret cellar_user
//!   password: !secret cellar_password
//!   scan_interval: 3600
//!
//! http:
//!   server_port: 8124
//! ```
//!
//! The loader understands these custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution

mod error;
mod integration;
mod loader;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use integration::{
    CellarConfig, Config, ServerConfig, DEFAULT_CURRENCY, DEFAULT_FETCH_TIMEOUT_SECS,
    DEFAULT_SCAN_INTERVAL_SECS, MAX_FETCH_TIMEOUT_SECS, MIN_SCAN_INTERVAL_SECS,
};
pub use loader::{load_yaml, load_yaml_string, YamlLoader};
pub use secrets::Secrets;

// Re-export serde_yaml::Value for convenience
pub use serde_yaml::Value;
