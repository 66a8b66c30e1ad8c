//! Handlers for the `/generos` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use biblioteca_core::search::{Page, Pagination};
use biblioteca_core::types::DbId;
use biblioteca_db::models::genre::{CreateGenre, Genre, GenreFilter, UpdateGenre};
use serde::Deserialize;

use super::parse_state;
use crate::error::AppResult;
use crate::middleware::client::ClientMeta;
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct GenreSearchParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub name: Option<String>,
    pub estado: Option<String>,
}

/// GET /api/v1/generos
pub async fn search(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(params): Query<GenreSearchParams>,
) -> AppResult<Json<DataResponse<Page<Genre>>>> {
    let filter = GenreFilter {
        name: params.name,
        state: parse_state(params.estado.as_deref())?,
    };
    let page = state
        .genres
        .search(&filter, Pagination::new(params.page, params.limit))
        .await?;
    Ok(Json(DataResponse::new(page)))
}

/// GET /api/v1/generos/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Genre>>> {
    let genre = state.genres.find_one(id).await?;
    Ok(Json(DataResponse::new(genre)))
}

/// POST /api/v1/generos
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<CreateGenre>,
) -> AppResult<(StatusCode, Json<DataResponse<Genre>>)> {
    let genre = state
        .genres
        .create(&admin.audit_context(meta), input)
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(genre))))
}

/// PUT /api/v1/generos/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateGenre>,
) -> AppResult<Json<DataResponse<Genre>>> {
    let genre = state
        .genres
        .update(&admin.audit_context(meta), id, input)
        .await?;
    Ok(Json(DataResponse::new(genre)))
}

/// DELETE /api/v1/generos/{id}
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Genre>>> {
    let genre = state.genres.remove(&admin.audit_context(meta), id).await?;
    Ok(Json(DataResponse::new(genre)))
}

/// POST /api/v1/generos/{id}/restore
pub async fn restore(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Genre>>> {
    let genre = state.genres.restore(&admin.audit_context(meta), id).await?;
    Ok(Json(DataResponse::new(genre)))
}
