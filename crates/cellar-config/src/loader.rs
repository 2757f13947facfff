//! Tag-aware YAML loading
//!
//! Values tagged `!include`, `!secret` or `!env_var` are replaced while the
//! document is walked; any other tag is left on its (resolved) value.

use crate::error::{ConfigError, ConfigResult};
use crate::secrets::Secrets;
use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Tags replaced during loading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Directive {
    Include,
    Secret,
    EnvVar,
}

impl Directive {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "!include" => Some(Self::Include),
            "!secret" => Some(Self::Secret),
            "!env_var" => Some(Self::EnvVar),
            _ => None,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Include => "!include",
            Self::Secret => "!secret",
            Self::EnvVar => "!env_var",
        }
    }
}

/// Loads YAML documents from one config directory
pub struct YamlLoader {
    config_dir: PathBuf,
    secrets: Secrets,
    /// Files being loaded, outermost first
    loading: Vec<PathBuf>,
}

impl YamlLoader {
    /// Loader for `config_dir`, reading its `secrets.yaml`
    pub fn new(config_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_dir = config_dir.into();
        let secrets = Secrets::load(&config_dir)?;
        Ok(Self::with_secrets(config_dir, secrets))
    }

    pub fn with_secrets(config_dir: impl Into<PathBuf>, secrets: Secrets) -> Self {
        Self {
            config_dir: config_dir.into(),
            secrets,
            loading: Vec::new(),
        }
    }

    /// Load a file; relative paths are taken from the config directory
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> ConfigResult<Value> {
        let path = absolute_in(&self.config_dir, path.as_ref());
        if self.loading.contains(&path) {
            return Err(ConfigError::CircularInclude { path });
        }
        debug!(path = %path.display(), "Loading YAML");

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::ReadFile {
            path: path.clone(),
            source,
        })?;

        self.loading.push(path.clone());
        let loaded = self.load_string(&content, &path);
        self.loading.pop();
        loaded
    }

    /// Load a document whose includes resolve relative to `source_path`
    pub fn load_string(&mut self, content: &str, source_path: &Path) -> ConfigResult<Value> {
        let document = serde_yaml::from_str(content).map_err(|source| ConfigError::ParseYaml {
            path: source_path.to_path_buf(),
            source,
        })?;
        self.resolve(document, source_path)
    }

    fn resolve(&mut self, value: Value, source_path: &Path) -> ConfigResult<Value> {
        Ok(match value {
            Value::Tagged(tagged) => self.resolve_tagged(*tagged, source_path)?,
            Value::Mapping(mapping) => {
                let mut resolved = Mapping::with_capacity(mapping.len());
                for (key, value) in mapping {
                    resolved.insert(
                        self.resolve(key, source_path)?,
                        self.resolve(value, source_path)?,
                    );
                }
                Value::Mapping(resolved)
            }
            Value::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(|item| self.resolve(item, source_path))
                    .collect::<ConfigResult<_>>()?,
            ),
            scalar => scalar,
        })
    }

    fn resolve_tagged(&mut self, tagged: TaggedValue, source_path: &Path) -> ConfigResult<Value> {
        let Some(directive) = Directive::from_tag(&tagged.tag.to_string()) else {
            trace!(tag = %tagged.tag, "Keeping unknown tag");
            let value = self.resolve(tagged.value, source_path)?;
            return Ok(Value::Tagged(Box::new(TaggedValue {
                tag: tagged.tag,
                value,
            })));
        };

        let argument = tagged.value.as_str().ok_or_else(|| match directive {
            Directive::Include => ConfigError::InvalidIncludePath {
                path: format!("{:?}", tagged.value),
                reason: "path must be a string".to_string(),
            },
            other => ConfigError::InvalidValue {
                key: other.tag().to_string(),
                reason: "argument must be a string".to_string(),
            },
        })?;

        match directive {
            Directive::Include => {
                let base = source_path.parent().unwrap_or(&self.config_dir);
                let target = absolute_in(base, Path::new(argument));
                self.load_file(target)
            }
            Directive::Secret => {
                trace!(key = argument, "Substituting secret");
                Ok(Value::String(self.secrets.get(argument)?.to_string()))
            }
            Directive::EnvVar => {
                let value = std::env::var(argument).map_err(|_| ConfigError::EnvVarNotFound {
                    var: argument.to_string(),
                })?;
                trace!(var = argument, "Substituting environment variable");
                Ok(Value::String(value))
            }
        }
    }

    pub fn secrets(&self) -> &Secrets {
        &self.secrets
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}

fn absolute_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Load `file` from `config_dir` with all tags resolved
pub fn load_yaml(config_dir: impl Into<PathBuf>, file: impl AsRef<Path>) -> ConfigResult<Value> {
    YamlLoader::new(config_dir)?.load_file(file)
}

/// Load an in-memory document as if it were `source_name` in `config_dir`
pub fn load_yaml_string(
    config_dir: impl Into<PathBuf>,
    content: &str,
    source_name: &str,
) -> ConfigResult<Value> {
    let config_dir = config_dir.into();
    let source = config_dir.join(source_name);
    YamlLoader::new(config_dir)?.load_string(content, &source)
}
