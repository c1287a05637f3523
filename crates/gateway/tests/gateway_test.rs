//! Integration tests for the repository gateway.
//!
//! The full router is driven with `oneshot` against repositories laid out in
//! a temporary directory. Audit events are captured in memory.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use common::{CacheRuleConfig, RepositoryConfig};
use domain::{AuditEvent, AuditEventType};
use gateway_lib::{build_app, config::GatewayConfig, state::AppState};
use repository_service::{AuditError, AuditSink, MockAuditSink, RepositoryRegistry};

const SECRET: &str = "test-secret-key-for-testing-only-32chars";
const ISSUER: &str = "https://idp.example.com/realms/files";

// =============================================================================
// Fixtures
// =============================================================================

/// Audit sink that keeps every event in memory
#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    fn of_type(&self, event_type: AuditEventType) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }
}

impl AuditSink for RecordingSink {
    fn publish(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.events.lock().push(event.clone());
        Ok(())
    }
}

/// storage/
///   outside.txt
///   public-docs/index.html, releases/v1.txt, site/index.html
///   internal/secret.txt
///   ops/runbook.md
///   listing/a.txt, B/
fn storage() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::write(root.join("outside.txt"), "outside-the-repositories").unwrap();

    fs::create_dir_all(root.join("public-docs/releases")).unwrap();
    fs::write(root.join("public-docs/index.html"), "<h1>docs</h1>").unwrap();
    fs::write(root.join("public-docs/releases/v1.txt"), "release one").unwrap();
    fs::create_dir_all(root.join("public-docs/site")).unwrap();
    fs::write(root.join("public-docs/site/index.html"), "<h1>site</h1>").unwrap();

    fs::create_dir_all(root.join("internal")).unwrap();
    fs::write(root.join("internal/secret.txt"), "top secret").unwrap();

    fs::create_dir_all(root.join("ops")).unwrap();
    fs::write(root.join("ops/runbook.md"), "# runbook").unwrap();

    fs::create_dir_all(root.join("listing/B")).unwrap();
    fs::write(root.join("listing/a.txt"), "a").unwrap();

    dir
}

fn definitions() -> Vec<RepositoryConfig> {
    let mut public_docs = RepositoryConfig::new("public-docs");
    public_docs.is_public = true;
    public_docs.cache_rules = vec![CacheRuleConfig::new("/releases/**", "365d")];

    let mut internal = RepositoryConfig::new("internal");
    internal.access_groups = vec!["admins".to_string()];
    internal.access_users = vec!["carol".to_string()];

    let mut ops = RepositoryConfig::new("ops");
    ops.access_expression = Some("isOneOf(claims['department'], 'ops', 'sre')".to_string());

    let mut listing = RepositoryConfig::new("listing");
    listing.is_public = true;

    vec![public_docs, internal, ops, listing]
}

fn app_with(storage: &TempDir, base_path: &str, sink: Arc<dyn AuditSink>) -> Router {
    app_with_definitions(storage, base_path, sink, &definitions())
}

fn app_with_definitions(
    storage: &TempDir,
    base_path: &str,
    sink: Arc<dyn AuditSink>,
    definitions: &[RepositoryConfig],
) -> Router {
    let config = GatewayConfig {
        storage_root: storage.path().to_path_buf(),
        identity_provider_uri: ISSUER.to_string(),
        jwt_secret: SECRET.to_string(),
        default_cache_max_age: Duration::from_secs(60),
        base_path: base_path.to_string(),
        ..GatewayConfig::default()
    };
    let registry = RepositoryRegistry::from_definitions(definitions).unwrap();
    let state = AppState::new(config, registry, sink).unwrap();
    build_app(state)
}

fn app(storage: &TempDir) -> (Router, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    (app_with(storage, "", sink.clone()), sink)
}

fn token(claims: Value) -> String {
    let mut claims = claims;
    claims["iss"] = json!(ISSUER);
    claims["exp"] = json!(chrono::Utc::now().timestamp() + 3600);
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_as(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).unwrap()
}

// =============================================================================
// Access decisions
// =============================================================================

#[tokio::test]
async fn test_public_repository_serves_anonymous_caller() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let response = app.oneshot(get("/public-docs/index.html")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/html; charset=utf-8"
    );
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "13");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
    assert!(response.headers().contains_key(header::LAST_MODIFIED));
    assert_eq!(body_text(response).await, "<h1>docs</h1>");

    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, AuditEventType::RepositoryHandler);
    assert_eq!(events[0].principal, "anonymousUser");
    assert_eq!(events[0].data.request_path, "/public-docs/index.html");
    assert_eq!(events[0].data.response_status, 200);
}

#[tokio::test]
async fn test_user_outside_access_groups_is_forbidden_and_audited_once() {
    let storage = storage();
    let mut sink = MockAuditSink::new();
    sink.expect_publish()
        .withf(|event| event.event_type == AuditEventType::AuthenticationSuccess)
        .times(1)
        .returning(|_| Ok(()));
    sink.expect_publish()
        .withf(|event| {
            event.event_type == AuditEventType::AuthorizationFailure
                && event.principal == "bob"
                && event.data.response_status == 403
        })
        .times(1)
        .returning(|_| Ok(()));
    let app = app_with(&storage, "", Arc::new(sink));

    let bob = token(json!({"preferred_username": "bob", "groups": ["users"]}));
    let response = app
        .oneshot(get_as("/internal/secret.txt", &bob))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        body_json(response).await,
        json!({"status": "fail", "data": "forbidden"})
    );
}

#[tokio::test]
async fn test_anonymous_caller_on_private_repository_is_unauthorized() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let response = app.oneshot(get("/internal/secret.txt")).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        body_json(response).await,
        json!({"status": "error", "data": "unauthorized"})
    );
    let failures = sink.of_type(AuditEventType::AuthorizationFailure);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].principal, "anonymousUser");
    assert_eq!(failures[0].data.response_status, 401);
}

#[tokio::test]
async fn test_group_user_and_expression_grants() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    let admin = token(json!({"sub": "alice", "groups": "admins,users"}));
    let response = app.clone().oneshot(get_as("/internal/secret.txt", &admin)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "top secret");

    let carol = token(json!({"sub": "carol"}));
    let response = app.clone().oneshot(get_as("/internal/secret.txt", &carol)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sre = token(json!({"sub": "dave", "department": "sre"}));
    let response = app.clone().oneshot(get_as("/ops/runbook.md", &sre)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let sales = token(json!({"sub": "erin", "department": "sales"}));
    let response = app.oneshot(get_as("/ops/runbook.md", &sales)).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let response = app
        .oneshot(get_as("/public-docs/index.html", "not-a-jwt"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let events = sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, AuditEventType::AuthorizationFailure);
}

// =============================================================================
// Path resolution
// =============================================================================

#[tokio::test]
async fn test_traversal_never_leaves_the_repository() {
    let storage = storage();
    let (app, _sink) = app(&storage);
    let admin = token(json!({"sub": "alice", "groups": ["admins"]}));

    for uri in [
        "/internal/../../etc/passwd",
        "/internal/../outside.txt",
        "/internal/%2e%2e/outside.txt",
        "/internal/..%2f..%2fetc%2fpasswd",
        "/internal/..%5coutside.txt",
        "/public-docs/../internal/secret.txt",
    ] {
        let response = app.clone().oneshot(get_as(uri, &admin)).await.unwrap();
        let status = response.status();
        assert!(
            status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN,
            "{} returned {}",
            uri,
            status
        );
        let body = body_text(response).await;
        assert!(!body.contains("outside-the-repositories"));
        assert!(!body.contains("top secret"));
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_symlink_out_of_repository_is_not_found() {
    let storage = storage();
    std::os::unix::fs::symlink(
        storage.path().join("internal/secret.txt"),
        storage.path().join("public-docs/leak.txt"),
    )
    .unwrap();
    let (app, _sink) = app(&storage);

    let response = app.oneshot(get("/public-docs/leak.txt")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        body_json(response).await,
        json!({"status": "error", "data": "not found"})
    );
}

#[tokio::test]
async fn test_missing_file_and_unknown_repository() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let response = app.clone().oneshot(get("/public-docs/nope.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/no-such-repo/file.txt")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(sink.of_type(AuditEventType::ErrorHandler).len(), 2);
}

#[tokio::test]
async fn test_directory_listing_is_ordinal() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    let response = app.oneshot(get("/listing/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["repository"], "listing");
    assert_eq!(listing["path"], "/");
    let entries = listing["entries"].as_array().unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["B", "a.txt"]);
    assert_eq!(entries[0]["type"], "directory");
    assert_eq!(entries[0]["pathRelativeToRoot"], "/B/");
    assert_eq!(entries[1]["type"], "file");
    assert_eq!(entries[1]["sizeBytes"], 1);
}

#[tokio::test]
async fn test_html_listing_on_request() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    let request = Request::builder()
        .uri("/listing/")
        .header(header::ACCEPT, "text/html,application/xhtml+xml,*/*;q=0.8")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    let html = body_text(response).await;
    assert!(html.contains("<a href=\"B/\">B/</a>"));
    assert!(html.contains("<a href=\"a.txt\">a.txt</a>"));
}

#[tokio::test]
async fn test_directory_without_slash_redirects_to_index() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    let response = app.clone().oneshot(get("/listing/B")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/listing/B/index.html");

    // No index file: the parent directory is listed instead
    let response = app.clone().oneshot(get("/listing/B/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let listing = body_json(response).await;
    assert_eq!(listing["path"], "/B/");

    // Index file present: served directly
    let response = app.oneshot(get("/public-docs/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "<h1>docs</h1>");
}

#[tokio::test]
async fn test_repository_without_slash_redirects_to_index() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let response = app.clone().oneshot(get("/listing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/listing/index.html");

    // Following the redirect lists the repository root
    let response = app.clone().oneshot(get("/listing/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["path"], "/");

    let response = app.oneshot(get("/public-docs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/public-docs/index.html");

    let events = sink.of_type(AuditEventType::RepositoryHandler);
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].data.response_status, 302);
}

#[tokio::test]
async fn test_repository_without_slash_redirect_keeps_base_path() {
    let storage = storage();
    let app = app_with(&storage, "/files", Arc::new(RecordingSink::default()));

    let response = app.oneshot(get("/files/listing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/files/listing/index.html"
    );
}

#[tokio::test]
async fn test_cache_rule_sets_max_age() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    let response = app.oneshot(get("/public-docs/releases/v1.txt")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=31536000");
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn test_cache_rule_matches_resolved_location() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    // `..` leaves `/releases` before the file is reached
    let response = app
        .oneshot(get("/public-docs/releases/../index.html"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
    assert_eq!(body_text(response).await, "<h1>docs</h1>");
}

#[tokio::test]
async fn test_cache_rule_matches_index_file_served_for_directory() {
    let storage = storage();
    let mut public_docs = RepositoryConfig::new("public-docs");
    public_docs.is_public = true;
    public_docs.cache_rules = vec![CacheRuleConfig::new("/**/*.html", "1h")];
    let app = app_with_definitions(
        &storage,
        "",
        Arc::new(RecordingSink::default()),
        &[public_docs],
    );

    let response = app.clone().oneshot(get("/public-docs/site/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=3600");
    assert_eq!(body_text(response).await, "<h1>site</h1>");

    let response = app.oneshot(get("/public-docs/releases/v1.txt")).await.unwrap();
    assert_eq!(response.headers()[header::CACHE_CONTROL], "max-age=60");
}

// =============================================================================
// Other endpoints
// =============================================================================

#[tokio::test]
async fn test_repository_index_lists_readable_repositories() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"repositories": [
            {"name": "public-docs", "isPublic": true},
            {"name": "listing", "isPublic": true},
        ]})
    );

    let admin = token(json!({"sub": "alice", "groups": ["admins"]}));
    let response = app.oneshot(get_as("/", &admin)).await.unwrap();
    let names: Vec<String> = body_json(response).await["repositories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["public-docs", "internal", "listing"]);

    assert_eq!(sink.of_type(AuditEventType::ListRepositories).len(), 2);
}

#[tokio::test]
async fn test_logout_and_health() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let alice = token(json!({"sub": "alice"}));
    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::AUTHORIZATION, format!("Bearer {}", alice))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let logouts = sink.of_type(AuditEventType::Logout);
    assert_eq!(logouts.len(), 1);
    assert_eq!(logouts[0].principal, "alice");

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"status": "healthy", "repositories": 4})
    );
}

#[tokio::test]
async fn test_write_methods_are_not_allowed() {
    let storage = storage();
    let (app, _sink) = app(&storage);

    let request = Request::builder()
        .method("PUT")
        .uri("/public-docs/index.html")
        .body(Body::from("overwrite"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        fs::read_to_string(storage.path().join("public-docs/index.html")).unwrap(),
        "<h1>docs</h1>"
    );
}

#[tokio::test]
async fn test_base_path_is_stripped_from_audit_records() {
    let storage = storage();
    let sink = Arc::new(RecordingSink::default());
    let app = app_with(&storage, "/files", sink.clone());

    let response = app.clone().oneshot(get("/files/public-docs/index.html")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get("/files/listing/B")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers()[header::LOCATION],
        "/files/listing/B/index.html"
    );

    let events = sink.events();
    assert_eq!(events[0].data.request_path, "/public-docs/index.html");
    assert_eq!(events[1].data.request_path, "/listing/B");
}

#[tokio::test]
async fn test_concurrent_requests_are_each_audited_once() {
    let storage = storage();
    let (app, sink) = app(&storage);

    let requests = (0..32).map(|i| {
        let app = app.clone();
        let uri = if i % 2 == 0 {
            "/public-docs/index.html"
        } else {
            "/internal/secret.txt"
        };
        async move { app.oneshot(get(uri)).await.unwrap().status() }
    });
    let statuses = futures::future::join_all(requests).await;

    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 16);
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::UNAUTHORIZED).count(), 16);
    assert_eq!(sink.events().len(), 32);
}
