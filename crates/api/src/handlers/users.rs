//! Handlers for the `/usuarios` resource. Admin only.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use biblioteca_core::search::{Page, Pagination};
use biblioteca_core::types::DbId;
use biblioteca_db::models::user::{UserFilter, UserResponse};
use serde::Deserialize;

use super::parse_state;
use crate::error::AppResult;
use crate::middleware::client::ClientMeta;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::services::users::{CreateUserRequest, UpdateUserRequest};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub estado: Option<String>,
}

/// GET /api/v1/usuarios
pub async fn search(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Query(params): Query<UserSearchParams>,
) -> AppResult<Json<DataResponse<Page<UserResponse>>>> {
    let filter = UserFilter {
        name: params.name,
        email: params.email,
        role: params.role,
        state: parse_state(params.estado.as_deref())?,
    };
    let page = state
        .users
        .search(&filter, Pagination::new(params.page, params.limit))
        .await?;
    Ok(Json(DataResponse::new(page)))
}

/// GET /api/v1/usuarios/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state.users.find_one(id).await?;
    Ok(Json(DataResponse::new(UserResponse::from(&user))))
}

/// POST /api/v1/usuarios
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<UserResponse>>)> {
    let user = state.users.create(&admin.audit_context(meta), input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(UserResponse::from(&user)))))
}

/// PUT /api/v1/usuarios/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateUserRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state
        .users
        .update(&admin.audit_context(meta), id, input)
        .await?;
    Ok(Json(DataResponse::new(UserResponse::from(&user))))
}

/// DELETE /api/v1/usuarios/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state.users.remove(&admin.audit_context(meta), id).await?;
    Ok(Json(DataResponse::new(UserResponse::from(&user))))
}

/// POST /api/v1/usuarios/{id}/restore
pub async fn restore(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let user = state.users.restore(&admin.audit_context(meta), id).await?;
    Ok(Json(DataResponse::new(UserResponse::from(&user))))
}
