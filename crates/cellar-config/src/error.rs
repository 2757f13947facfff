use std::io;
use std::path::PathBuf;
use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Why the configuration could not be loaded
///
/// Every variant names the file, tag or key at fault so that the message
/// alone is enough to fix the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid YAML: {source}", path.display())]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("!secret {key}: no such entry in secrets.yaml")]
    SecretNotFound { key: String },

    #[error("!include {path}: {reason}")]
    InvalidIncludePath { path: String, reason: String },

    /// A file that is already being loaded was included again
    #[error("{} includes itself", path.display())]
    CircularInclude { path: PathBuf },

    #[error("!env_var {var}: variable is not set")]
    EnvVarNotFound { var: String },

    #[error("configuration has no `{section}:` section")]
    MissingSection { section: String },

    /// `key` is a dotted path such as `cellar_tracker.username`
    #[error("{key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
