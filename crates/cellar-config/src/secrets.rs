//! `secrets.yaml` lookups for the `!secret` tag

use crate::error::{ConfigError, ConfigResult};
use serde_yaml::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const SECRETS_FILE: &str = "secrets.yaml";

/// Values from a config directory's `secrets.yaml`
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    values: HashMap<String, String>,
    /// Where the values came from; `None` when there was no file
    path: Option<PathBuf>,
}

impl Secrets {
    /// Read `secrets.yaml` from `config_dir`; no file means no secrets
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(SECRETS_FILE);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No secrets file");
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::ReadFile { path, source }),
        };

        let parsed: Option<HashMap<String, Value>> =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseYaml {
                path: path.clone(),
                source,
            })?;
        let values: HashMap<String, String> = parsed
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, scalar_to_string(value)))
            .collect();

        debug!(path = %path.display(), count = values.len(), "Loaded secrets");
        Ok(Self {
            values,
            path: Some(path),
        })
    }

    /// Secrets given directly rather than read from disk
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            path: None,
        }
    }

    pub fn get(&self, key: &str) -> ConfigResult<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::SecretNotFound {
                key: key.to_string(),
            })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Passwords are often all digits, so any scalar is taken as text
fn scalar_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}
