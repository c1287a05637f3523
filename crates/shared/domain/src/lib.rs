//! Domain layer - Repository model, identities, listings and audit records.
//!
//! This crate contains pure domain types with no infrastructure dependencies.
//! All types here are shared by the repository service and the gateway.

pub mod audit;
pub mod constants;
pub mod error;
pub mod identity;
pub mod repository;
pub mod resource;

pub use audit::{AuditData, AuditEvent, AuditEventType};
pub use constants::*;
pub use error::{DomainError, DomainResult};
pub use identity::Identity;
pub use repository::{is_valid_repository_name, CacheRule, Repository};
pub use resource::{human_readable_size, DirectoryEntry, FileEntry, ResourceEntry};
