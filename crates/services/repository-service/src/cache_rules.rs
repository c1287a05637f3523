//! Cache rule matching.
//!
//! Rules are evaluated in configuration order; the first match wins.

use std::time::Duration;

use glob::{MatchOptions, Pattern};

use domain::CACHE_PATTERN_PREFIX;

use crate::registry::RegisteredRepository;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled cache rule pattern.
#[derive(Debug, Clone)]
pub enum PathPattern {
    /// Matches the path itself and everything beneath it
    Prefix(String),
    /// Shell-style glob; `*` stays within one segment, `**` crosses segments
    Glob(Pattern),
}

impl PathPattern {
    /// Compile a pattern, returning the reason it was rejected on failure.
    pub fn parse(pattern: &str) -> Result<Self, String> {
        if !pattern.starts_with(CACHE_PATTERN_PREFIX) {
            return Err("must start with '/'".to_string());
        }

        let normalized = trim_trailing_slash(pattern);
        if normalized.contains(['*', '?', '[']) {
            Pattern::new(normalized)
                .map(PathPattern::Glob)
                .map_err(|e| format!("is not a valid glob: {}", e.msg))
        } else {
            Ok(PathPattern::Prefix(normalized.to_string()))
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        let path = trim_trailing_slash(path);
        match self {
            PathPattern::Prefix(prefix) if prefix == "/" => true,
            PathPattern::Prefix(prefix) => {
                path == prefix
                    || path
                        .strip_prefix(prefix.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            }
            PathPattern::Glob(glob) => glob.matches_with(path, GLOB_OPTIONS),
        }
    }
}

/// Remove trailing separators, keeping a lone `/`.
fn trim_trailing_slash(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

/// Maps request paths to a client cache max-age.
#[derive(Debug, Clone, Copy)]
pub struct CacheRuleMatcher {
    default_max_age: Duration,
}

impl CacheRuleMatcher {
    pub fn new(default_max_age: Duration) -> Self {
        Self { default_max_age }
    }

    pub fn default_max_age(&self) -> Duration {
        self.default_max_age
    }

    /// Max-age of the first rule matching `request_path`, or the default.
    ///
    /// `request_path` is relative to the repository root and starts with `/`.
    pub fn match_path(&self, repository: &RegisteredRepository, request_path: &str) -> Duration {
        let path = if request_path.starts_with('/') {
            request_path.to_string()
        } else {
            format!("/{}", request_path)
        };

        repository
            .cache_patterns()
            .iter()
            .find(|(pattern, _)| pattern.matches(&path))
            .map(|(_, max_age)| *max_age)
            .unwrap_or(self.default_max_age)
    }
}
