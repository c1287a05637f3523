//! Repository service
//!
//! Authorization decisions and traversal-safe resource resolution for the
//! repository gateway:
//! - Repository registry built once from configuration
//! - Access control (public, group, user and expression rules)
//! - Path resolution and directory listings
//! - Cache rule matching
//! - Audit trail

pub mod access;
pub mod audit;
pub mod cache_rules;
pub mod lister;
pub mod registry;
pub mod resolver;

pub use access::{AccessControlEngine, Decision, Grant};
pub use audit::{AuditError, AuditSink, AuditTrail, JsonLinesAuditSink, TracingAuditSink};
pub use cache_rules::{CacheRuleMatcher, PathPattern};
pub use lister::ResourceLister;
pub use registry::{RegisteredRepository, RepositoryRegistry};
pub use resolver::{relative_path, Location, PathResolver, ResolveError};

#[cfg(any(test, feature = "test-utils"))]
pub use audit::MockAuditSink;
