//! Route definitions for the `/usuarios` resource.

use axum::routing::{get, post};
use axum::{middleware, Router};
use biblioteca_core::classify::resources;

use crate::handlers::users;
use crate::middleware::audit::{audit_requests, AuditConfig, RequestAudit};
use crate::state::AppState;

/// Routes mounted at `/usuarios`. All require the admin role.
///
/// ```text
/// GET    /               -> search
/// POST   /               -> create
/// GET    /{id}           -> get_by_id
/// PUT    /{id}           -> update
/// DELETE /{id}           -> delete
/// POST   /{id}/restore   -> restore
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(users::search).post(users::create))
        .route(
            "/{id}",
            get(users::get_by_id)
                .put(users::update)
                .delete(users::delete),
        )
        .route("/{id}/restore", post(users::restore))
        .route_layer(middleware::from_fn_with_state(
            RequestAudit::new(state, AuditConfig::for_resource(resources::USERS)),
            audit_requests,
        ))
}
