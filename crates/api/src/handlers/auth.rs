//! Handlers for the `/auth` resource (register, login, me).

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use biblioteca_audit::AuditContext;
use biblioteca_core::audit::Actor;
use biblioteca_db::models::user::UserResponse;

use crate::error::AppResult;
use crate::middleware::client::ClientMeta;
use crate::middleware::rbac::RequireAuth;
use crate::response::DataResponse;
use crate::services::auth::{AuthResponse, LoginRequest, RegisterRequest};
use crate::state::AppState;

/// POST /api/v1/auth/register
///
/// Create a `user` account and return a token for it.
pub async fn register(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<AuthResponse>>)> {
    let ctx = AuditContext::new(Actor::anonymous(), meta);
    let response = state.auth.register(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(response))))
}

/// POST /api/v1/auth/login
///
/// Authenticate with email + password.
pub async fn login(
    State(state): State<AppState>,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let ctx = AuditContext::new(Actor::anonymous(), meta);
    let response = state.auth.login(&ctx, input).await?;
    Ok(Json(DataResponse::new(response)))
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let me = state.auth.me(user.user_id).await?;
    Ok(Json(DataResponse::new(me)))
}
