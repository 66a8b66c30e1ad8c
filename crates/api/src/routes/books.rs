//! Route definitions for the `/libros` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{middleware, Router};
use biblioteca_core::classify::resources;

use crate::handlers::books;
use crate::middleware::audit::{audit_requests, AuditConfig, RequestAudit};
use crate::services::books::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Body limit for the cover upload: the image plus multipart framing.
const UPLOAD_BODY_LIMIT: usize = MAX_IMAGE_BYTES + 1024 * 1024;

/// Routes mounted at `/libros`.
///
/// ```text
/// GET    /               -> search
/// POST   /               -> create
/// GET    /export         -> export (CSV)
/// GET    /{id}           -> get_by_id
/// PUT    /{id}           -> update
/// DELETE /{id}           -> delete
/// POST   /{id}/restore   -> restore
/// POST   /{id}/imagen    -> upload_image
/// ```
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(books::search).post(books::create))
        .route("/export", get(books::export))
        .route(
            "/{id}",
            get(books::get_by_id)
                .put(books::update)
                .delete(books::delete),
        )
        .route("/{id}/restore", post(books::restore))
        .route(
            "/{id}/imagen",
            post(books::upload_image).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route_layer(middleware::from_fn_with_state(
            RequestAudit::new(state, AuditConfig::for_resource(resources::BOOKS)),
            audit_requests,
        ))
}
