//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::{middleware, Router};
use biblioteca_core::classify::resources;

use crate::handlers::auth;
use crate::middleware::audit::{audit_requests, AuditConfig, RequestAudit};
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /register  -> register
/// POST /login     -> login
/// GET  /me        -> me (requires auth)
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route_layer(middleware::from_fn_with_state(
            RequestAudit::new(state, AuditConfig::for_resource(resources::AUTH)),
            audit_requests,
        ))
}
