//! Sensor entity ids and slugs

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity id must look like `domain.object_id`")]
    InvalidFormat,

    #[error("entity id domain is empty")]
    EmptyDomain,

    #[error("entity id object_id is empty")]
    EmptyObjectId,

    #[error("domain may only hold a-z, 0-9 and single inner underscores")]
    InvalidDomainChars,

    #[error("object_id may only hold a-z, 0-9 and inner underscores")]
    InvalidObjectIdChars,
}

/// An entity id such as `sensor.cellar_tracker_total_bottles`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    domain: String,
    object_id: String,
}

impl EntityId {
    pub fn new(
        domain: impl Into<String>,
        object_id: impl Into<String>,
    ) -> Result<Self, EntityIdError> {
        let domain = domain.into();
        let object_id = object_id.into();

        match (domain.is_empty(), object_id.is_empty()) {
            (true, _) => return Err(EntityIdError::EmptyDomain),
            (_, true) => return Err(EntityIdError::EmptyObjectId),
            _ => {}
        }
        if !is_slug(&domain) || domain.contains("__") {
            return Err(EntityIdError::InvalidDomainChars);
        }
        if !is_slug(&object_id) {
            return Err(EntityIdError::InvalidObjectIdChars);
        }

        Ok(Self { domain, object_id })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    /// Same entity with `_{n}` appended to the object id
    pub fn with_suffix(&self, n: usize) -> Self {
        Self {
            domain: self.domain.clone(),
            object_id: format!("{}_{}", self.object_id, n),
        }
    }
}

/// Lowercase ASCII alphanumerics and underscores, not starting or ending with `_`
fn is_slug(s: &str) -> bool {
    !s.starts_with('_')
        && !s.ends_with('_')
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('.') {
            Some((domain, object_id)) if !object_id.contains('.') => Self::new(domain, object_id),
            _ => Err(EntityIdError::InvalidFormat),
        }
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.to_string()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.domain, self.object_id)
    }
}

/// Lowercase `value` and collapse every run of other characters into `_`
///
/// The result is trimmed of underscores, so it is a valid object id unless
/// it is empty.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_separator = false;
    for c in value.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_separator && !slug.is_empty() {
                slug.push('_');
            }
            pending_separator = false;
            slug.push(c);
        } else {
            pending_separator = true;
        }
    }
    slug
}

/// Drop a trailing parenthesized part, as in `"2015 Margaux (750ml)"`
pub fn strip_size_suffix(wine_key: &str) -> &str {
    let trimmed = wine_key.trim_end();
    let Some(inner) = trimmed.strip_suffix(')') else {
        return wine_key;
    };
    match inner.rfind('(') {
        Some(open) if !inner[open + 1..].contains(')') => trimmed[..open].trim_end(),
        _ => wine_key,
    }
}
