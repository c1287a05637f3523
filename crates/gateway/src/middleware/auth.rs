//! Identity middleware.
//!
//! Requests without credentials continue as the anonymous identity. A bearer
//! token must be a valid HS256 JWT issued by the configured identity
//! provider, otherwise the request is rejected with 401.

use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use common::AppError;
use domain::{AuditEventType, Identity, ANONYMOUS_PRINCIPAL};

use crate::request::RequestDetails;
use crate::state::AppState;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token carries neither preferred_username nor sub")]
    MissingPrincipal,
}

/// Verifies bearer tokens and turns their claims into an [`Identity`].
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &[u8], issuer: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.validate_aud = false;

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify `token` and build the caller identity from its claims.
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Map<String, Value>>(token, &self.key, &self.validation)?;
        identity_from_claims(data.claims)
    }
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("issuer", &self.validation.iss)
            .finish_non_exhaustive()
    }
}

/// Principal is `preferred_username`, falling back to `sub`. Groups come from
/// the `groups` claim, either an array or a comma separated string.
fn identity_from_claims(claims: Map<String, Value>) -> Result<Identity, TokenError> {
    let principal = ["preferred_username", "sub"]
        .iter()
        .filter_map(|key| claims.get(*key).and_then(Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty() && *name != ANONYMOUS_PRINCIPAL)
        .ok_or(TokenError::MissingPrincipal)?
        .to_string();

    let groups: Vec<String> = match claims.get("groups") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|group| group.trim().to_string())
            .filter(|group| !group.is_empty())
            .collect(),
        Some(Value::String(joined)) => joined
            .split(',')
            .map(|group| group.trim().to_string())
            .filter(|group| !group.is_empty())
            .collect(),
        _ => Vec::new(),
    };

    Ok(Identity::new(principal, groups).with_claims(claims))
}

/// Identity middleware that attaches an [`Identity`] to every request.
pub async fn identity_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let details = RequestDetails::from_request(&request);

    let identity = match bearer_token(request.headers()) {
        Ok(None) => Identity::anonymous(),
        Ok(Some(token)) => match state.tokens.verify(token) {
            Ok(identity) => {
                debug!(principal = %identity.principal, "Authenticated bearer token");
                state.audit.emit(
                    &identity.principal,
                    AuditEventType::AuthenticationSuccess,
                    details.audit_data(StatusCode::OK),
                );
                identity
            }
            Err(e) => return reject(&state, &details, &e.to_string()),
        },
        Err(reason) => return reject(&state, &details, reason),
    };

    request.extensions_mut().insert(identity);
    next.run(request).await
}

fn reject(state: &AppState, details: &RequestDetails, reason: &str) -> Response {
    warn!(path = %details.path, remote_address = %details.remote_address, "Rejected credentials: {}", reason);
    let error = AppError::Unauthorized;
    state.audit.emit(
        ANONYMOUS_PRINCIPAL,
        AuditEventType::AuthorizationFailure,
        details.audit_data(error.status()),
    );
    error.into_response()
}

/// Extract bearer token from Authorization header.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| "malformed Authorization header")?;

    match header.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(Some(token.trim()))
        }
        _ => Err("unsupported Authorization scheme"),
    }
}
