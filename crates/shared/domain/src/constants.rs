//! Domain-level constants.
//!
//! These constants define repository rules and identity conventions.

// =============================================================================
// Identity
// =============================================================================

/// Principal assigned to callers without a validated token
pub const ANONYMOUS_PRINCIPAL: &str = "anonymousUser";

// =============================================================================
// Repositories
// =============================================================================

/// Pattern every repository name must match
pub const REPOSITORY_NAME_PATTERN: &str = r"^[A-Za-z0-9_-]+$";

/// Index file used when a repository does not configure one
pub const DEFAULT_INDEX_FILE_NAME: &str = "index.html";

// =============================================================================
// Cache Rules
// =============================================================================

/// Seconds per day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Upper bound for a cache rule max-age (365 days)
pub const MAX_CACHE_MAX_AGE_SECONDS: u64 = 365 * SECONDS_PER_DAY;

/// Every cache rule pattern is anchored at the repository root
pub const CACHE_PATTERN_PREFIX: char = '/';
