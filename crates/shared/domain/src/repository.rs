//! Repository domain entity and cache rules.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::Serialize;

use crate::constants::DEFAULT_INDEX_FILE_NAME;

/// A (path-pattern, max-age) pair controlling client-cache duration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheRule {
    /// Repository-relative pattern, always starting with `/`
    pub pattern: String,
    /// Client cache lifetime for matching paths
    #[serde(serialize_with = "serialize_seconds")]
    pub max_age: Duration,
}

impl CacheRule {
    pub fn new(pattern: impl Into<String>, max_age: Duration) -> Self {
        Self {
            pattern: pattern.into(),
            max_age,
        }
    }
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(value.as_secs())
}

/// A named, independently access-controlled file tree.
///
/// Instances are built once by the registry and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    pub name: String,
    pub access_groups: BTreeSet<String>,
    pub access_users: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_expression: Option<String>,
    pub is_public: bool,
    pub cache_rules: Vec<CacheRule>,
    pub index_file_name: String,
}

impl Repository {
    /// Create a private repository with no access mechanisms and no cache rules.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access_groups: BTreeSet::new(),
            access_users: BTreeSet::new(),
            access_expression: None,
            is_public: false,
            cache_rules: Vec::new(),
            index_file_name: DEFAULT_INDEX_FILE_NAME.to_string(),
        }
    }

    /// The configured access expression, if it is non-blank.
    pub fn expression(&self) -> Option<&str> {
        self.access_expression
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
    }

    /// Whether any per-identity access mechanism is configured.
    pub fn has_access_control(&self) -> bool {
        !self.access_groups.is_empty() || !self.access_users.is_empty() || self.expression().is_some()
    }

    /// A repository that is neither public nor carries any access mechanism
    /// denies every identity.
    pub fn is_deny_all(&self) -> bool {
        !self.is_public && !self.has_access_control()
    }
}

/// Check a repository name against `^[A-Za-z0-9_-]+$`.
pub fn is_valid_repository_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name_validation() {
        assert!(is_valid_repository_name("public-docs"));
        assert!(is_valid_repository_name("Maven_Central-2"));
        assert!(!is_valid_repository_name(""));
        assert!(!is_valid_repository_name("../etc"));
        assert!(!is_valid_repository_name("with space"));
        assert!(!is_valid_repository_name("dotted.name"));
        assert!(!is_valid_repository_name("ümlaut"));
    }

    #[test]
    fn test_blank_expression_is_ignored() {
        let mut repository = Repository::new("internal");
        repository.access_expression = Some("   ".to_string());
        assert_eq!(repository.expression(), None);
        assert!(repository.is_deny_all());
    }

    #[test]
    fn test_public_repository_is_not_deny_all() {
        let mut repository = Repository::new("docs");
        repository.is_public = true;
        assert!(!repository.is_deny_all());
        assert!(!repository.has_access_control());
    }
}
