//! Session handlers.

use axum::{extract::State, http::StatusCode, routing::post, Extension, Router};
use tracing::info;

use domain::{AuditEventType, Identity};

use crate::handlers::method_not_allowed;
use crate::request::RequestDetails;
use crate::state::AppState;

/// Create session routes.
pub fn session_routes() -> Router<AppState> {
    Router::new().route("/logout", post(logout).fallback(method_not_allowed))
}

/// Logout endpoint. Tokens are stateless, so this only records the event.
pub async fn logout(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    details: RequestDetails,
) -> StatusCode {
    info!(principal = %identity.principal, "Logout");
    state.audit.emit(
        &identity.principal,
        AuditEventType::Logout,
        details.audit_data(StatusCode::NO_CONTENT),
    );
    StatusCode::NO_CONTENT
}
