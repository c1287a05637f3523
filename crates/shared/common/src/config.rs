//! Shared configuration structures.
//!
//! Repository definitions are read from a JSON document, e.g.
//!
//! ```json
//! { "repositories": [
//!     { "name": "public-docs", "isPublic": true,
//!       "cacheRules": [ { "pattern": "/releases/**", "maxAge": "365d" } ] } ] }
//! ```

use std::path::Path;

use domain::DEFAULT_INDEX_FILE_NAME;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level repository definitions document.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RepositoriesConfig {
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

impl RepositoriesConfig {
    /// Read and parse a repository definitions file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    /// Parse repository definitions from a JSON string.
    pub fn from_json(contents: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(contents).map_err(|source| ConfigError::Parse {
            path: "<inline>".to_string(),
            source,
        })
    }
}

/// One repository definition as written in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryConfig {
    pub name: String,
    #[serde(default)]
    pub access_groups: Vec<String>,
    #[serde(default)]
    pub access_users: Vec<String>,
    #[serde(default)]
    pub access_expression: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub cache_rules: Vec<CacheRuleConfig>,
    #[serde(default = "default_index_file_name")]
    pub index_file_name: String,
}

impl RepositoryConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access_groups: Vec::new(),
            access_users: Vec::new(),
            access_expression: None,
            is_public: false,
            cache_rules: Vec::new(),
            index_file_name: default_index_file_name(),
        }
    }
}

fn default_index_file_name() -> String {
    DEFAULT_INDEX_FILE_NAME.to_string()
}

/// A cache rule as written in configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRuleConfig {
    pub pattern: String,
    pub max_age: DurationValue,
}

impl CacheRuleConfig {
    pub fn new(pattern: impl Into<String>, max_age: impl Into<DurationValue>) -> Self {
        Self {
            pattern: pattern.into(),
            max_age: max_age.into(),
        }
    }
}

/// A duration given either as whole seconds or as text with a unit suffix.
///
/// Values stay signed so that negative durations reach validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(i64),
    Text(String),
}

impl DurationValue {
    pub fn as_seconds(&self) -> Result<i64, ConfigError> {
        match self {
            DurationValue::Seconds(seconds) => Ok(*seconds),
            DurationValue::Text(text) => parse_duration_seconds(text),
        }
    }
}

impl From<i64> for DurationValue {
    fn from(seconds: i64) -> Self {
        DurationValue::Seconds(seconds)
    }
}

impl From<&str> for DurationValue {
    fn from(text: &str) -> Self {
        DurationValue::Text(text.to_string())
    }
}

/// Parse `"90"`, `"500ms"`, `"30s"`, `"15m"`, `"12h"` or `"365d"` into whole seconds.
///
/// Millisecond values are truncated towards zero.
pub fn parse_duration_seconds(text: &str) -> Result<i64, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(text.to_string());
    let trimmed = text.trim();

    let split = trimmed
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let value: i64 = number.parse().map_err(|_| invalid())?;
    let seconds = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" => Some(value / 1000),
        "" | "s" => Some(value),
        "m" => value.checked_mul(60),
        "h" => value.checked_mul(3_600),
        "d" => value.checked_mul(86_400),
        _ => None,
    };
    seconds.ok_or_else(invalid)
}
