//! Repository index handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Serialize;

use domain::{AuditEventType, Identity};

use crate::handlers::method_not_allowed;
use crate::request::RequestDetails;
use crate::state::AppState;

/// A repository the caller may read.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySummary {
    pub name: String,
    pub is_public: bool,
}

/// Response of `GET /`.
#[derive(Debug, Serialize)]
pub struct RepositoryIndex {
    pub repositories: Vec<RepositorySummary>,
}

/// Create repository index routes.
pub fn index_routes() -> Router<AppState> {
    Router::new().route("/", get(list_repositories).fallback(method_not_allowed))
}

/// List the repositories the caller is allowed to read, in configuration order.
pub async fn list_repositories(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    details: RequestDetails,
) -> Json<RepositoryIndex> {
    let repositories = state
        .registry
        .iter()
        .filter(|repository| state.access.decide(&identity, repository).is_allowed())
        .map(|repository| RepositorySummary {
            name: repository.name.clone(),
            is_public: repository.is_public,
        })
        .collect();

    state.audit.emit(
        &identity.principal,
        AuditEventType::ListRepositories,
        details.audit_data(StatusCode::OK),
    );

    Json(RepositoryIndex { repositories })
}
