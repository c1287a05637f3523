//! Repository content handlers.
//!
//! Every request is decided, resolved and audited exactly once:
//! `REPOSITORY_HANDLER` on success, `AUTHORIZATION_FAILURE` on denial and
//! `ERROR_HANDLER` for missing resources or internal failures.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Extension, Router,
};
use chrono::{DateTime, Utc};
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use common::{AppError, AppResult};
use domain::{AuditEventType, Identity, Repository};
use repository_service::{relative_path, Location, RegisteredRepository, ResolveError};

use crate::content_type::content_type;
use crate::handlers::method_not_allowed;
use crate::listing::{prefers_html, render_html, Listing};
use crate::request::RequestDetails;
use crate::state::AppState;

/// Create repository routes.
pub fn repository_routes() -> Router<AppState> {
    Router::new()
        .route("/:repository", get(serve_repository).fallback(method_not_allowed))
        .route("/:repository/", get(serve_repository).fallback(method_not_allowed))
        .route("/:repository/*path", get(serve_repository).fallback(method_not_allowed))
}

/// Serve a file, a directory listing or an index redirect.
///
/// The raw request path is used instead of the path parameters so that
/// percent-encoding reaches the resolver untouched.
pub async fn serve_repository(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    details: RequestDetails,
    headers: HeaderMap,
) -> Response {
    let (event_type, response) = match handle(&state, &identity, &details.path, &headers).await {
        Ok(response) => (AuditEventType::RepositoryHandler, response),
        Err(error) => {
            let event_type = match error {
                AppError::Unauthorized | AppError::Forbidden => {
                    info!(
                        principal = %identity.principal,
                        path = %details.path,
                        "Access denied"
                    );
                    AuditEventType::AuthorizationFailure
                }
                _ => AuditEventType::ErrorHandler,
            };
            (event_type, error.into_response())
        }
    };

    state.audit.emit(
        &identity.principal,
        event_type,
        details.audit_data(response.status()),
    );
    response
}

async fn handle(
    state: &AppState,
    identity: &Identity,
    path: &str,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let (name, remainder) = split_repository_path(path);
    let repository = state.registry.lookup(name)?;

    if !state.access.decide(identity, &repository).is_allowed() {
        return Err(if identity.is_anonymous() {
            AppError::Unauthorized
        } else {
            AppError::Forbidden
        });
    }

    let location = {
        let resolver = state.resolver.clone();
        let repository = repository.clone();
        let remainder = remainder.to_string();
        tokio::task::spawn_blocking(move || resolver.resolve(&repository, &remainder))
            .await
            .map_err(|e| AppError::internal(format!("resolver task failed: {}", e)))?
    };

    match location {
        Ok(Location::File(file)) => serve_file(state, &repository, file).await,
        Ok(Location::Directory(directory)) => {
            list_directory(state, repository, remainder, directory, headers).await
        }
        Ok(Location::Redirect(target)) => redirect(state, &repository, &target),
        Err(ResolveError::NotFound) | Err(ResolveError::Forbidden) => Err(AppError::NotFound),
    }
}

/// `/name/rest` -> (`name`, `/rest`), `/name` -> (`name`, ``)
fn split_repository_path(path: &str) -> (&str, &str) {
    let path = path.strip_prefix('/').unwrap_or(path);
    match path.find('/') {
        Some(index) => path.split_at(index),
        None => (path, ""),
    }
}

/// Cache rules match the file's physical location, so `..` segments and
/// index files served for a directory request are matched by where they
/// really are.
async fn serve_file(
    state: &AppState,
    repository: &RegisteredRepository,
    path: PathBuf,
) -> AppResult<Response> {
    // The stream owns the handle, which is closed when the body is dropped.
    let file = tokio::fs::File::open(&path).await.map_err(io_error)?;
    let metadata = file.metadata().await.map_err(io_error)?;

    let root = tokio::fs::canonicalize(state.resolver.repository_root(repository))
        .await
        .map_err(io_error)?;
    let relative = relative_path(&root, &path)
        .ok_or_else(|| AppError::internal("resolved file is outside the repository root"))?;
    let max_age = state.cache_rules.match_path(repository, &relative);

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type(&path))
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(header::CACHE_CONTROL, format!("max-age={}", max_age.as_secs()));
    if let Ok(modified) = metadata.modified() {
        response = response.header(header::LAST_MODIFIED, http_date(modified));
    }

    debug!(repository = %repository.name, file = %path.display(), "Streaming file");
    response
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::internal(e.to_string()))
}

async fn list_directory(
    state: &AppState,
    repository: Arc<RegisteredRepository>,
    request_path: &str,
    directory: PathBuf,
    headers: &HeaderMap,
) -> AppResult<Response> {
    let entries = {
        let resolver = state.resolver.clone();
        let lister = state.lister;
        let repository = repository.clone();
        tokio::task::spawn_blocking(move || {
            let root = resolver.repository_root(&repository).canonicalize()?;
            lister.list(&root, &directory)
        })
        .await
        .map_err(|e| AppError::internal(format!("listing task failed: {}", e)))?
        .map_err(io_error)?
    };

    let listing = Listing {
        repository: repository.name.clone(),
        path: listing_path(&decode_lossy(request_path)),
        entries,
    };

    if prefers_html(headers) {
        Ok(Html(render_html(&listing)).into_response())
    } else {
        Ok(Json(listing).into_response())
    }
}

fn redirect(state: &AppState, repository: &Repository, target: &str) -> AppResult<Response> {
    let location = format!("{}/{}{}", state.config.base_path, repository.name, target);
    let location = HeaderValue::try_from(location).map_err(|e| AppError::internal(e.to_string()))?;
    Ok((StatusCode::FOUND, [(header::LOCATION, location)]).into_response())
}

/// Directory part of the request path, always ending with `/`.
fn listing_path(request_path: &str) -> String {
    let directory = match request_path.rfind('/') {
        Some(index) if !request_path.ends_with('/') => &request_path[..=index],
        _ => request_path,
    };
    if directory.is_empty() {
        "/".to_string()
    } else {
        directory.to_string()
    }
}

fn decode_lossy(path: &str) -> String {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn io_error(err: io::Error) -> AppError {
    match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => AppError::NotFound,
        _ => AppError::internal(err.to_string()),
    }
}
