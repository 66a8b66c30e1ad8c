//! Route definitions for the audit reports.

use axum::routing::get;
use axum::{middleware, Router};
use biblioteca_core::classify::resources;

use crate::handlers::audit;
use crate::middleware::audit::{audit_requests, AuditConfig, RequestAudit};
use crate::state::AppState;

/// Routes mounted at `/audit`. All require the admin role.
///
/// ```text
/// GET /report                   -> report
/// GET /users/{id}/activity      -> user_activity
/// GET /security                 -> security
/// GET /statistics               -> statistics
/// GET /suspicious-activity      -> suspicious_activity
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/report", get(audit::report))
        .route("/users/{id}/activity", get(audit::user_activity))
        .route("/security", get(audit::security))
        .route("/statistics", get(audit::statistics))
        .route("/suspicious-activity", get(audit::suspicious_activity))
        .route_layer(middleware::from_fn_with_state(
            RequestAudit::new(state, AuditConfig::for_resource(resources::AUDIT)),
            audit_requests,
        ))
}
