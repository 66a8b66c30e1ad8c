//! Route definitions for the `/generos` resource.

use axum::routing::{get, post};
use axum::{middleware, Router};
use biblioteca_core::classify::resources;

use crate::handlers::genres;
use crate::middleware::audit::{audit_requests, AuditConfig, RequestAudit};
use crate::state::AppState;

/// Routes mounted at `/generos`.
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
        .route("/", get(genres::search).post(genres::create))
        .route(
            "/{id}",
            get(genres::get_by_id)
                .put(genres::update)
                .delete(genres::delete),
        )
        .route("/{id}/restore", post(genres::restore))
        .route_layer(middleware::from_fn_with_state(
            RequestAudit::new(state, AuditConfig::for_resource(resources::GENRES)),
            audit_requests,
        ))
}
