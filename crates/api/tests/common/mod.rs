#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use biblioteca_api::auth::jwt::JwtConfig;
use biblioteca_api::config::{AdminSeed, LogBackend, LogConfig, ServerConfig, StorageBackend};
use biblioteca_api::router::build_app_router;
use biblioteca_api::services::lifecycle::StatusFallback;
use biblioteca_api::state::AppState;
use biblioteca_audit::{LogStream, MemoryLogSink, RetentionPolicy};
use biblioteca_core::audit::{AuditCategory, AuditLogEntry};
use biblioteca_db::memory::MemoryStore;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@biblioteca.test";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_PASSWORD: &str = "lector-password";

/// A router over in-memory storage plus handles to inspect what it wrote.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub sink: Arc<MemoryLogSink>,
    /// Keeps the upload directory alive for the test's duration.
    pub uploads: TempDir,
}

impl TestApp {
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.sink.entries(LogStream::Audit)
    }

    pub fn has_audit_action(&self, action: &str) -> bool {
        self.audit_entries().iter().any(|e| e.action == action)
    }

    /// Entries written by the request instrumentation (one per request),
    /// excluding the extra SECURITY alerts.
    pub fn request_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_entries()
            .into_iter()
            .filter(|e| e.category != AuditCategory::Security)
            .filter(|e| {
                e.details
                    .as_ref()
                    .is_some_and(|d| d.get("statusCode").is_some())
            })
            .collect()
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(upload_dir: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough".to_string(),
            access_token_expiry_mins: 60,
        },
        log: LogConfig {
            dir: upload_dir.join("logs"),
            backend: LogBackend::Memory,
            retention: RetentionPolicy::default(),
            prune_interval_secs: 3600,
        },
        storage: StorageBackend::Memory,
        status_fallback: Some(StatusFallback::default()),
        slow_operation_ms: 3000,
        critical_operation_ms: 5000,
        upload_dir: upload_dir.to_path_buf(),
        admin: Some(AdminSeed {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            name: "Administrador".to_string(),
        }),
    }
}

/// Build the full application router with all middleware layers and a
/// seeded admin account.
pub async fn build_test_app() -> TestApp {
    let uploads = tempfile::tempdir().expect("tempdir");
    let config = test_config(uploads.path());
    let sink = Arc::new(MemoryLogSink::new());
    let state = AppState::new(Arc::new(MemoryStore::new()), sink.clone(), config.clone());

    let seed = config.admin.as_ref().expect("admin seed");
    state.users.ensure_admin(seed).await.expect("seed admin");

    let router = build_app_router(state.clone(), &config);
    TestApp {
        router,
        state,
        sink,
        uploads,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, request: Request<Body>) -> Response {
    app.oneshot(request).await.expect("router is infallible")
}

fn json_request(method: Method, uri: &str, body: &Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response {
    send(app, empty_request(Method::GET, uri, None)).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, empty_request(Method::GET, uri, Some(token))).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response {
    send(app, json_request(Method::POST, uri, &body, None)).await
}

pub async fn post_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, json_request(Method::POST, uri, &body, Some(token))).await
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, empty_request(Method::POST, uri, Some(token))).await
}

pub async fn put_json_auth(app: Router, uri: &str, body: Value, token: &str) -> Response {
    send(app, json_request(Method::PUT, uri, &body, Some(token))).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response {
    send(app, empty_request(Method::DELETE, uri, Some(token))).await
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}

pub async fn body_text(response: Response) -> String {
    String::from_utf8(body_bytes(response).await).expect("UTF-8 body")
}

// ---------------------------------------------------------------------------
// Account helpers
// ---------------------------------------------------------------------------

pub async fn login(app: Router, email: &str, password: &str) -> String {
    let response = post_json(
        app,
        "/api/v1/auth/login",
        json!({ "email": email, "password": password }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK, "login as {email}");
    body_json(response).await["data"]["access_token"]
        .as_str()
        .expect("access_token")
        .to_string()
}

pub async fn admin_token(app: &TestApp) -> String {
    login(app.app(), ADMIN_EMAIL, ADMIN_PASSWORD).await
}

/// Register a plain user and return `(user_id, token)`.
pub async fn register_user(app: &TestApp, email: &str) -> (i64, String) {
    let response = post_json(
        app.app(),
        "/api/v1/auth/register",
        json!({ "email": email, "name": "Lector", "password": USER_PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "register {email}");
    let json = body_json(response).await;
    let id = json["data"]["user"]["id"].as_i64().expect("user id");
    let token = json["data"]["access_token"].as_str().expect("token").to_string();
    (id, token)
}

/// Create a book as admin and return its JSON.
pub async fn create_book(app: &TestApp, token: &str, title: &str, editorial: &str) -> Value {
    let response = post_json_auth(
        app.app(),
        "/api/v1/libros",
        json!({
            "title": title,
            "author": "Jorge Luis Borges",
            "editorial": editorial,
            "price": 19.9,
        }),
        token,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED, "create {title}");
    body_json(response).await["data"].clone()
}
