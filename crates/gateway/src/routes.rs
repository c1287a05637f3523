//! Route configuration.

use axum::{middleware, Router};

use crate::handlers::{health_routes, index_routes, not_found, repository_routes, session_routes};
use crate::middleware::identity_middleware;
use crate::state::AppState;

/// Create the main router with all routes.
///
/// When a base path is configured the whole application is nested under it.
pub fn create_router(state: AppState) -> Router {
    let base_path = state.config.base_path.clone();

    // Identified routes (anonymous callers allowed, bad tokens rejected)
    let identified = Router::new()
        .merge(index_routes())
        .merge(session_routes())
        .merge(repository_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            identity_middleware,
        ));

    let app = Router::new()
        // Health check (no identity)
        .merge(health_routes())
        .merge(identified)
        .fallback(not_found)
        .with_state(state);

    if base_path.is_empty() {
        app
    } else {
        Router::new().nest(&base_path, app).fallback(not_found)
    }
}
