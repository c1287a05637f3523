//! Request details recorded in audit events.

use std::net::SocketAddr;

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, Extensions, HeaderMap, Method, Request, StatusCode, Uri},
};

use domain::AuditData;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_ADDRESS: &str = "unknown";

/// Method, path and peer of the current request.
///
/// `path` is relative to the gateway mount point, so the mount prefix never
/// shows up in audit records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDetails {
    pub method: String,
    pub path: String,
    pub remote_address: String,
}

impl RequestDetails {
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap, extensions: &Extensions) -> Self {
        Self {
            method: method.to_string(),
            path: uri.path().to_string(),
            remote_address: remote_address(headers, extensions),
        }
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        Self::new(
            request.method(),
            request.uri(),
            request.headers(),
            request.extensions(),
        )
    }

    pub fn audit_data(&self, status: StatusCode) -> AuditData {
        AuditData {
            request_method: self.method.clone(),
            request_path: self.path.clone(),
            response_status: status.as_u16(),
            remote_address: self.remote_address.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestDetails
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::new(&parts.method, &parts.uri, &parts.headers, &parts.extensions))
    }
}

/// First `X-Forwarded-For` hop, else the socket peer.
fn remote_address(headers: &HeaderMap, extensions: &Extensions) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    match forwarded {
        Some(address) => address.to_string(),
        None => extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
    }
}
