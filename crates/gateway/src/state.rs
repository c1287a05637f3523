//! Application state for dependency injection.

use std::sync::Arc;

use tracing::info;

use common::ConfigError;
use repository_service::{
    AccessControlEngine, AuditSink, AuditTrail, CacheRuleMatcher, JsonLinesAuditSink,
    PathResolver, RepositoryRegistry, ResourceLister, TracingAuditSink,
};

use crate::config::GatewayConfig;
use crate::middleware::TokenVerifier;

/// Application state shared across handlers.
///
/// Everything except the audit trail is immutable after startup.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<RepositoryRegistry>,
    pub access: AccessControlEngine,
    pub resolver: Arc<PathResolver>,
    pub lister: ResourceLister,
    pub cache_rules: CacheRuleMatcher,
    pub audit: AuditTrail,
    pub tokens: Arc<TokenVerifier>,
    pub config: Arc<GatewayConfig>,
}

impl AppState {
    /// Create new app state with an explicit audit sink.
    pub fn new(
        config: GatewayConfig,
        registry: RepositoryRegistry,
        sink: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        let resolver = PathResolver::new(&config.storage_root).map_err(|source| ConfigError::Io {
            path: config.storage_root.display().to_string(),
            source,
        })?;

        Ok(Self {
            registry: Arc::new(registry),
            access: AccessControlEngine::new(),
            resolver: Arc::new(resolver),
            lister: ResourceLister::new(),
            cache_rules: CacheRuleMatcher::new(config.default_cache_max_age),
            audit: AuditTrail::new(sink),
            tokens: Arc::new(TokenVerifier::new(
                config.jwt_secret_bytes(),
                &config.identity_provider_uri,
            )),
            config: Arc::new(config),
        })
    }

    /// Create app state with the audit sink selected by configuration.
    pub fn from_config(config: GatewayConfig, registry: RepositoryRegistry) -> Result<Self, ConfigError> {
        let sink: Arc<dyn AuditSink> = match &config.audit_log_path {
            Some(path) => {
                let sink = JsonLinesAuditSink::open(path).map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                })?;
                info!("Writing audit events to {}", path.display());
                Arc::new(sink)
            }
            None => Arc::new(TracingAuditSink),
        };

        Self::new(config, registry, sink)
    }
}
