//! Gateway configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use common::{parse_duration_seconds, ConfigError};

const DEFAULT_REPOSITORIES_FILE: &str = "repositories.json";
const MIN_JWT_SECRET_LENGTH: usize = 32;
#[cfg(debug_assertions)]
const DEV_JWT_SECRET: &str = "development-only-secret-change-me-0123456789";

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Local directory holding one sub-directory per repository
    pub storage_root: PathBuf,
    /// Expected `iss` of bearer tokens
    pub identity_provider_uri: String,
    /// HS256 key for bearer tokens (min 32 characters)
    pub jwt_secret: String,
    /// JSON file with repository definitions
    pub repositories_file: PathBuf,
    /// max-age used when no cache rule matches
    pub default_cache_max_age: Duration,
    /// JSON-lines audit file; audit events are logged when unset
    pub audit_log_path: Option<PathBuf>,
    /// Mount prefix, e.g. `/files`; empty when mounted at the root
    pub base_path: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let storage_root = var("STORAGE_LOCATION")
            .ok_or(ConfigError::MissingStorageLocation)
            .and_then(|location| parse_storage_location(&location))?;
        let identity_provider_uri =
            var("IDENTITY_PROVIDER_URI").ok_or(ConfigError::MissingIdentityProvider)?;
        let jwt_secret = jwt_secret(var("JWT_SECRET"))?;

        let default_cache_max_age = match var("DEFAULT_CACHE_MAX_AGE") {
            Some(text) => {
                let seconds = parse_duration_seconds(&text)?;
                let seconds = u64::try_from(seconds).map_err(|_| {
                    ConfigError::InvalidSetting(format!(
                        "DEFAULT_CACHE_MAX_AGE must not be negative, got '{}'",
                        text
                    ))
                })?;
                Duration::from_secs(seconds)
            }
            None => Duration::ZERO,
        };

        let port = match var("SERVER_PORT") {
            Some(port) => port.parse().map_err(|_| {
                ConfigError::InvalidSetting(format!("SERVER_PORT '{}' is not a valid port", port))
            })?,
            None => 3000,
        };

        Ok(Self {
            storage_root,
            identity_provider_uri,
            jwt_secret,
            repositories_file: var("REPOSITORIES_FILE")
                .unwrap_or_else(|| DEFAULT_REPOSITORIES_FILE.to_string())
                .into(),
            default_cache_max_age,
            audit_log_path: var("AUDIT_LOG_PATH").map(PathBuf::from),
            base_path: normalize_base_path(var("GATEWAY_BASE_PATH").as_deref().unwrap_or("")),
            host: var("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port,
        })
    }

    /// Get JWT secret as bytes.
    pub fn jwt_secret_bytes(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }
}

/// Accept a plain directory path or a `file://` URI.
fn parse_storage_location(location: &str) -> Result<PathBuf, ConfigError> {
    let location = location.trim();
    if let Some(path) = location.strip_prefix("file://") {
        return Ok(PathBuf::from(path));
    }
    if location.contains("://") {
        return Err(ConfigError::UnsupportedStorageLocation(location.to_string()));
    }
    Ok(PathBuf::from(location))
}

fn jwt_secret(configured: Option<String>) -> Result<String, ConfigError> {
    match configured {
        Some(secret) if secret.len() >= MIN_JWT_SECRET_LENGTH => Ok(secret),
        Some(_) => Err(ConfigError::InvalidSetting(format!(
            "JWT_SECRET must be at least {} characters",
            MIN_JWT_SECRET_LENGTH
        ))),
        #[cfg(debug_assertions)]
        None => {
            tracing::warn!("JWT_SECRET not set, using the development secret");
            Ok(DEV_JWT_SECRET.to_string())
        }
        #[cfg(not(debug_assertions))]
        None => Err(ConfigError::InvalidSetting(
            "JWT_SECRET must be set (minimum 32 characters)".to_string(),
        )),
    }
}

/// `files/` -> `/files`, `/` -> ``
fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("."),
            identity_provider_uri: String::new(),
            jwt_secret: String::new(),
            repositories_file: PathBuf::from(DEFAULT_REPOSITORIES_FILE),
            default_cache_max_age: Duration::ZERO,
            audit_log_path: None,
            base_path: String::new(),
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}
