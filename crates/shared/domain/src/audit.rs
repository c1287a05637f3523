//! Audit events describing access decisions and lifecycle actions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Kind of audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    ErrorHandler,
    Logout,
    RepositoryHandler,
    ListRepositories,
    AuthorizationFailure,
    AuthenticationSuccess,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AuditEventType::ErrorHandler => "ERROR_HANDLER",
            AuditEventType::Logout => "LOGOUT",
            AuditEventType::RepositoryHandler => "REPOSITORY_HANDLER",
            AuditEventType::ListRepositories => "LIST_REPOSITORIES",
            AuditEventType::AuthorizationFailure => "AUTHORIZATION_FAILURE",
            AuditEventType::AuthenticationSuccess => "AUTHENTICATION_SUCCESS",
        };
        write!(f, "{}", name)
    }
}

/// Request details attached to an audit event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditData {
    pub request_method: String,
    /// Path as seen by the client, without the gateway's mount prefix
    pub request_path: String,
    pub response_status: u16,
    pub remote_address: String,
}

/// A single audit record handed to the audit sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub principal: String,
    #[serde(rename = "type")]
    pub event_type: AuditEventType,
    pub timestamp: DateTime<Utc>,
    pub data: AuditData,
}

impl AuditEvent {
    pub fn new(principal: impl Into<String>, event_type: AuditEventType, data: AuditData) -> Self {
        Self {
            id: Uuid::new_v4(),
            principal: principal.into(),
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }
}
