//! Request-level audit instrumentation.
//!
//! Applied per resource router with a fixed [`AuditConfig`]:
//!
//! ```ignore
//! Router::new()
//!     .route("/", get(handlers::books::search))
//!     .route_layer(middleware::from_fn_with_state(
//!         RequestAudit::new(state, AuditConfig::for_resource(resources::BOOKS)),
//!         audit_requests,
//!     ))
//! ```
//!
//! Every request yields exactly one request-level entry (success or failure).
//! Security-relevant failures add a SECURITY entry; slow requests add a
//! performance entry. Audit write failures never change the response.

use std::time::Instant;

use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use biblioteca_audit::{AuditContext, AuditError, AuditRecorder, Outcome};
use biblioteca_core::audit::{
    Actor, AuditCategory, AuditDetails, AuditLevel, AuditLogEntry, RequestDetails,
};
use biblioteca_core::classify::{
    category_for_resource, classify_operation, is_security_relevant, performance_level,
    resource_id,
};

use super::auth::user_from_headers;
use super::client::request_meta;
use crate::auth::jwt::JwtConfig;
use crate::error::ErrorMessage;
use crate::router::API_PREFIX;
use crate::state::AppState;

/// Action of the extra entry written for security-relevant failures.
pub const ACTION_SECURITY_ALERT: &str = "SECURITY_ALERT";

/// Static per-router instrumentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditConfig {
    pub category: AuditCategory,
    pub resource_type: &'static str,
    pub log_success: bool,
    pub log_failure: bool,
}

impl AuditConfig {
    /// Log both outcomes under the category owning `resource_type`.
    pub fn for_resource(resource_type: &'static str) -> Self {
        Self {
            category: category_for_resource(Some(resource_type)),
            resource_type,
            log_success: true,
            log_failure: true,
        }
    }
}

/// Middleware state: the shared recorder plus this router's settings.
#[derive(Clone)]
pub struct RequestAudit {
    recorder: AuditRecorder,
    jwt: JwtConfig,
    slow_ms: u64,
    critical_ms: u64,
    config: AuditConfig,
}

impl RequestAudit {
    pub fn new(state: &AppState, config: AuditConfig) -> Self {
        Self {
            recorder: state.recorder.clone(),
            jwt: state.config.jwt.clone(),
            slow_ms: state.config.slow_operation_ms,
            critical_ms: state.config.critical_operation_ms,
            config,
        }
    }
}

pub async fn audit_requests(
    State(audit): State<RequestAudit>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let method = request.method().to_string();
    let url = request
        .extensions()
        .get::<OriginalUri>()
        .map(|OriginalUri(uri)| uri.clone())
        .unwrap_or_else(|| request.uri().clone());
    let path = url
        .path()
        .strip_prefix(API_PREFIX)
        .unwrap_or(url.path())
        .to_string();
    let actor = user_from_headers(request.headers(), &audit.jwt)
        .map(|user| user.actor())
        .unwrap_or_else(Actor::anonymous);
    let ctx = AuditContext::new(actor, request_meta(request.headers(), request.extensions()));

    let response = next.run(request).await;

    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let status = response.status();
    let operation = classify_operation(&method, &path);
    let config = audit.config;

    let mut details = RequestDetails {
        method,
        url: url.to_string(),
        operation: operation.to_string(),
        status_code: status.as_u16(),
        error: None,
    };

    if status.as_u16() < 400 {
        if config.log_success {
            let entry = request_entry(&ctx, &config, operation, true, &path, duration_ms)
                .with_details(AuditDetails::Request(details));
            report(audit.recorder.record(entry).await, operation);
        }
        if let Some(level) = performance_level(duration_ms, audit.slow_ms, audit.critical_ms) {
            report(
                audit
                    .recorder
                    .log_performance(&ctx, operation, duration_ms, audit.slow_ms, level)
                    .await,
                operation,
            );
        }
        return response;
    }

    let message = response
        .extensions()
        .get::<ErrorMessage>()
        .map(|ErrorMessage(m)| m.clone())
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Request failed")
                .to_string()
        });
    details.error = Some(message.clone());

    if config.log_failure {
        let mut entry = request_entry(&ctx, &config, operation, false, &path, duration_ms)
            .with_error(message.clone())
            .with_details(AuditDetails::Request(details.clone()));
        if status.is_server_error() {
            entry = entry.with_level(AuditLevel::Error);
        }
        report(audit.recorder.record(entry).await, operation);
    }

    if is_security_relevant(status.as_u16(), &path, Some(&message)) {
        report(
            audit
                .recorder
                .log_security(
                    &ctx,
                    ACTION_SECURITY_ALERT,
                    Outcome::failure(message),
                    AuditDetails::Request(details),
                )
                .await,
            ACTION_SECURITY_ALERT,
        );
    }

    response
}

fn request_entry(
    ctx: &AuditContext,
    config: &AuditConfig,
    operation: &str,
    success: bool,
    path: &str,
    duration_ms: u64,
) -> AuditLogEntry {
    AuditLogEntry::new(config.category, operation, success)
        .with_actor(&ctx.actor)
        .with_request_meta(&ctx.meta)
        .with_resource(config.resource_type, resource_id(path))
        .with_duration(duration_ms)
}

fn report(result: Result<(), AuditError>, action: &str) {
    if let Err(e) = result {
        tracing::error!(action, error = %e, "Failed to record request audit entry");
    }
}
