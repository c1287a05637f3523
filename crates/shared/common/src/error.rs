//! Unified error handling for startup and request processing.
//!
//! Provides:
//! - `ConfigError` for fatal startup failures
//! - `AppError` for per-request failures, convertible into Axum responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use domain::DomainError;
use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Startup Errors
// =============================================================================

/// Configuration errors. Any of these prevents the process from starting.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("STORAGE_LOCATION must be set")]
    MissingStorageLocation,

    #[error("IDENTITY_PROVIDER_URI must be set")]
    MissingIdentityProvider,

    #[error("storage location '{0}' is not supported; only local directories can be served")]
    UnsupportedStorageLocation(String),

    #[error("{0}")]
    InvalidSetting(String),

    #[error("no repositories configured")]
    NoRepositories,

    #[error("repository name '{0}' must match ^[A-Za-z0-9_-]+$")]
    InvalidRepositoryName(String),

    #[error("repository '{0}' is configured more than once")]
    DuplicateRepository(String),

    #[error("repository '{0}' is public and must not set accessGroups, accessUsers or accessExpression")]
    PublicWithAccessControl(String),

    #[error("repository '{repository}': index file name '{index_file_name}' must be a plain file name")]
    InvalidIndexFileName {
        repository: String,
        index_file_name: String,
    },

    #[error("repository '{repository}': cache rule pattern '{pattern}' {reason}")]
    InvalidCachePattern {
        repository: String,
        pattern: String,
        reason: String,
    },

    #[error("repository '{repository}': cache rule '{pattern}' maxAge of {seconds}s must be between 0 and 365 days")]
    CacheMaxAgeOutOfRange {
        repository: String,
        pattern: String,
        seconds: i64,
    },

    #[error("invalid duration '{0}'")]
    InvalidDuration(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// Request Errors
// =============================================================================

/// Per-request error types. None of them is fatal to the server.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Access denied")]
    Forbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Internal server error")]
    Internal(String),
}

/// JSend-style response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    status: &'static str,
    data: String,
}

impl AppError {
    /// JSend status: `fail` for rejected input, `error` for everything else
    pub fn jsend_status(&self) -> &'static str {
        match self {
            AppError::Forbidden | AppError::MethodNotAllowed => "fail",
            _ => "error",
        }
    }

    /// Get HTTP status code
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get user-facing message (hides internal details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "unauthorized".to_string(),
            AppError::Forbidden => "forbidden".to_string(),
            AppError::NotFound => "not found".to_string(),
            AppError::MethodNotAllowed => "method not allowed".to_string(),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "internal server error".to_string()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse {
            status: self.jsend_status(),
            data: self.user_message(),
        };

        (status, Json(body)).into_response()
    }
}

// =============================================================================
// Domain Error Conversion
// =============================================================================

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound(_) => AppError::NotFound,
        }
    }
}

/// Result type alias
pub type AppResult<T> = Result<T, AppError>;

/// Convenience constructors
impl AppError {
    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::internal("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_jsend_bodies() {
        assert_eq!(AppError::Unauthorized.jsend_status(), "error");
        assert_eq!(AppError::Unauthorized.user_message(), "unauthorized");
        assert_eq!(AppError::Forbidden.jsend_status(), "fail");
        assert_eq!(AppError::Forbidden.user_message(), "forbidden");
        assert_eq!(AppError::NotFound.jsend_status(), "error");
        assert_eq!(AppError::NotFound.user_message(), "not found");
    }

    #[test]
    fn test_internal_message_is_hidden() {
        let error = AppError::internal("disk on fire at /var/lib/secret");
        assert_eq!(error.user_message(), "internal server error");
    }

    #[test]
    fn test_domain_not_found_maps_to_404() {
        let error: AppError = DomainError::not_found("repository 'x'").into();
        assert_eq!(error.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_config_error_names_repository() {
        let error = ConfigError::PublicWithAccessControl("docs".to_string());
        assert!(error.to_string().contains("'docs'"));
    }
}
