//! Repository registry.
//!
//! Built once at startup from configuration and read-only afterwards.
//! Loading fails on the first rule violation so the process refuses to start.

use std::collections::{BTreeSet, HashMap};
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use common::{CacheRuleConfig, ConfigError, RepositoriesConfig, RepositoryConfig};
use domain::{
    is_valid_repository_name, CacheRule, DomainError, DomainResult, Repository,
    MAX_CACHE_MAX_AGE_SECONDS,
};

use crate::access::expression::{self, Expr, ExpressionError, MAX_EVAL_DEPTH, MAX_NESTING_DEPTH};
use crate::cache_rules::PathPattern;

/// A repository with its cache patterns and access expression compiled once.
///
/// Dereferences to the [`Repository`] it was built from.
#[derive(Debug, Clone)]
pub struct RegisteredRepository {
    repository: Repository,
    cache_patterns: Vec<(PathPattern, Duration)>,
    expression: Option<Result<Expr, ExpressionError>>,
}

impl RegisteredRepository {
    pub fn compile(repository: Repository) -> Self {
        let cache_patterns = repository
            .cache_rules
            .iter()
            .filter_map(|rule| {
                PathPattern::parse(&rule.pattern)
                    .ok()
                    .map(|pattern| (pattern, rule.max_age))
            })
            .collect();
        let expression = repository.expression().map(expression::compile);

        Self {
            repository,
            cache_patterns,
            expression,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Cache rules in configuration order; patterns that do not compile are left out.
    pub fn cache_patterns(&self) -> &[(PathPattern, Duration)] {
        &self.cache_patterns
    }

    /// The compiled access expression, `None` when the repository has none.
    pub fn compiled_expression(&self) -> Option<&Result<Expr, ExpressionError>> {
        self.expression.as_ref()
    }
}

impl From<Repository> for RegisteredRepository {
    fn from(repository: Repository) -> Self {
        Self::compile(repository)
    }
}

impl Deref for RegisteredRepository {
    type Target = Repository;

    fn deref(&self) -> &Repository {
        &self.repository
    }
}

/// Validated, immutable index of repositories by name.
#[derive(Debug, Clone)]
pub struct RepositoryRegistry {
    by_name: HashMap<String, Arc<RegisteredRepository>>,
    /// Repositories in configuration order
    ordered: Vec<Arc<RegisteredRepository>>,
}

impl RepositoryRegistry {
    /// Validate and index repository definitions.
    pub fn load(config: &RepositoriesConfig) -> Result<Self, ConfigError> {
        Self::from_definitions(&config.repositories)
    }

    pub fn from_definitions(definitions: &[RepositoryConfig]) -> Result<Self, ConfigError> {
        if definitions.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        let mut by_name = HashMap::with_capacity(definitions.len());
        let mut ordered = Vec::with_capacity(definitions.len());

        for definition in definitions {
            let repository = Arc::new(RegisteredRepository::compile(build_repository(definition)?));
            if let Some(Err(e)) = repository.compiled_expression() {
                warn!("{}", unusable_expression_message(&repository.name, e));
            }
            if by_name
                .insert(repository.name.clone(), repository.clone())
                .is_some()
            {
                return Err(ConfigError::DuplicateRepository(repository.name.clone()));
            }
            ordered.push(repository);
        }

        info!(
            "Loaded {} repositories: {}",
            ordered.len(),
            ordered
                .iter()
                .map(|r| r.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { by_name, ordered })
    }

    /// Find a repository by its exact name.
    pub fn lookup(&self, name: &str) -> DomainResult<Arc<RegisteredRepository>> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| DomainError::not_found(format!("repository '{}'", name)))
    }

    /// Repositories in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RegisteredRepository>> {
        self.ordered.iter()
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }
}

fn build_repository(definition: &RepositoryConfig) -> Result<Repository, ConfigError> {
    let name = definition.name.as_str();
    if !is_valid_repository_name(name) {
        return Err(ConfigError::InvalidRepositoryName(definition.name.clone()));
    }

    let access_groups = non_blank(&definition.access_groups);
    let access_users = non_blank(&definition.access_users);
    let access_expression = definition
        .access_expression
        .as_deref()
        .map(str::trim)
        .filter(|source| !source.is_empty())
        .map(str::to_string);

    if definition.is_public
        && (!access_groups.is_empty() || !access_users.is_empty() || access_expression.is_some())
    {
        return Err(ConfigError::PublicWithAccessControl(name.to_string()));
    }

    let index_file_name = definition.index_file_name.trim();
    if !is_plain_file_name(index_file_name) {
        return Err(ConfigError::InvalidIndexFileName {
            repository: name.to_string(),
            index_file_name: definition.index_file_name.clone(),
        });
    }

    let cache_rules = definition
        .cache_rules
        .iter()
        .map(|rule| build_cache_rule(name, rule))
        .collect::<Result<Vec<_>, _>>()?;

    let repository = Repository {
        name: name.to_string(),
        access_groups,
        access_users,
        access_expression,
        is_public: definition.is_public,
        cache_rules,
        index_file_name: index_file_name.to_string(),
    };

    if repository.is_deny_all() {
        warn!(
            "Repository '{}' is not public and has no access rules; every request will be denied",
            repository.name
        );
    }

    Ok(repository)
}

fn unusable_expression_message(repository: &str, error: &ExpressionError) -> String {
    format!(
        "Repository '{}' has an access expression that will never grant access \
         (nesting limit {}, tree depth limit {}; every chained 'and'/'or' adds a level): {}",
        repository, MAX_NESTING_DEPTH, MAX_EVAL_DEPTH, error
    )
}

fn build_cache_rule(repository: &str, rule: &CacheRuleConfig) -> Result<CacheRule, ConfigError> {
    PathPattern::parse(&rule.pattern).map_err(|reason| ConfigError::InvalidCachePattern {
        repository: repository.to_string(),
        pattern: rule.pattern.clone(),
        reason,
    })?;

    let seconds = rule.max_age.as_seconds()?;
    if seconds < 0 || (seconds as u64) > MAX_CACHE_MAX_AGE_SECONDS {
        return Err(ConfigError::CacheMaxAgeOutOfRange {
            repository: repository.to_string(),
            pattern: rule.pattern.clone(),
            seconds,
        });
    }

    Ok(CacheRule::new(
        rule.pattern.clone(),
        Duration::from_secs(seconds as u64),
    ))
}

fn non_blank(values: &[String]) -> BTreeSet<String> {
    values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
