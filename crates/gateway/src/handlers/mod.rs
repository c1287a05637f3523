//! HTTP request handlers.

mod health_handler;
mod index_handler;
mod repository_handler;
mod session_handler;

pub use health_handler::{health_check, health_routes, HealthResponse};
pub use index_handler::{index_routes, list_repositories, RepositoryIndex, RepositorySummary};
pub use repository_handler::{repository_routes, serve_repository};
pub use session_handler::{logout, session_routes};

use common::AppError;

/// Fallback for unknown routes.
pub async fn not_found() -> AppError {
    AppError::NotFound
}

/// Fallback for methods a route does not serve.
pub async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}
