//! Repository Gateway Library
//!
//! HTTP surface of the multi-repository file server: identifies the caller,
//! asks the repository service for an access decision and streams files or
//! directory listings.

pub mod config;
pub mod content_type;
pub mod handlers;
pub mod listing;
pub mod middleware;
pub mod request;
pub mod routes;
pub mod state;

use std::net::SocketAddr;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use common::{ConfigError, RepositoriesConfig};
use repository_service::RepositoryRegistry;

use crate::config::GatewayConfig;
use crate::routes::create_router;
use crate::state::AppState;

/// Load and validate the repository definitions named by the configuration.
pub fn load_registry(config: &GatewayConfig) -> Result<RepositoryRegistry, ConfigError> {
    let definitions = RepositoriesConfig::from_file(&config.repositories_file)?;
    RepositoryRegistry::load(&definitions)
}

/// Build the application with request tracing.
pub fn build_app(state: AppState) -> Router {
    create_router(state).layer(TraceLayer::new_for_http())
}

/// Run the HTTP server with the given configuration.
pub async fn run_server_with_config(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    let registry = load_registry(&config)?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let state = AppState::from_config(config, registry)?;

    info!(
        storage = %state.resolver.storage_root().display(),
        repositories = state.registry.len(),
        "Repository gateway listening on {}",
        addr
    );

    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
