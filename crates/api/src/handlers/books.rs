//! Handlers for the `/libros` resource.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use biblioteca_core::search::{Page, Pagination};
use biblioteca_core::types::DbId;
use biblioteca_db::models::book::{Book, BookFilter, CreateBook, UpdateBook};
use serde::Deserialize;

use super::parse_state;
use crate::error::{AppError, AppResult};
use crate::middleware::client::ClientMeta;
use crate::middleware::rbac::{RequireAdmin, RequireAuth};
use crate::response::DataResponse;
use crate::state::AppState;

/// Multipart field carrying the cover image.
const IMAGE_FIELD: &str = "image";

/// Query parameters for `GET /libros` and `GET /libros/export`.
#[derive(Debug, Default, Deserialize)]
pub struct BookSearchParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub editorial: Option<String>,
    pub genre_id: Option<DbId>,
    pub available: Option<bool>,
    /// `activo` or `eliminado`.
    pub estado: Option<String>,
}

impl BookSearchParams {
    fn filter(&self) -> AppResult<BookFilter> {
        Ok(BookFilter {
            title: self.title.clone(),
            author: self.author.clone(),
            editorial: self.editorial.clone(),
            genre_id: self.genre_id,
            available: self.available,
            state: parse_state(self.estado.as_deref())?,
        })
    }
}

/// GET /api/v1/libros
pub async fn search(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Query(params): Query<BookSearchParams>,
) -> AppResult<Json<DataResponse<Page<Book>>>> {
    let filter = params.filter()?;
    let page = state
        .books
        .search(&filter, Pagination::new(params.page, params.limit))
        .await?;
    Ok(Json(DataResponse::new(page)))
}

/// GET /api/v1/libros/export
///
/// Every matching book as a CSV attachment. Pagination is ignored.
pub async fn export(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ClientMeta(meta): ClientMeta,
    Query(params): Query<BookSearchParams>,
) -> AppResult<impl IntoResponse> {
    let filter = params.filter()?;
    let csv = state
        .books
        .export_to_csv(&user.audit_context(meta), &filter)
        .await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"libros.csv\""),
        ],
        csv,
    ))
}

/// GET /api/v1/libros/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    RequireAuth(_user): RequireAuth,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Book>>> {
    let book = state.books.find_one(id).await?;
    Ok(Json(DataResponse::new(book)))
}

/// POST /api/v1/libros
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Json(input): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<DataResponse<Book>>)> {
    let book = state.books.create(&admin.audit_context(meta), input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(book))))
}

/// PUT /api/v1/libros/{id}
pub async fn update(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
    Json(input): Json<UpdateBook>,
) -> AppResult<Json<DataResponse<Book>>> {
    let book = state
        .books
        .update(&admin.audit_context(meta), id, input)
        .await?;
    Ok(Json(DataResponse::new(book)))
}

/// DELETE /api/v1/libros/{id}
///
/// Soft delete. Returns the book in its deleted state.
pub async fn delete(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Book>>> {
    let book = state.books.remove(&admin.audit_context(meta), id).await?;
    Ok(Json(DataResponse::new(book)))
}

/// POST /api/v1/libros/{id}/restore
pub async fn restore(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
) -> AppResult<Json<DataResponse<Book>>> {
    let book = state.books.restore(&admin.audit_context(meta), id).await?;
    Ok(Json(DataResponse::new(book)))
}

/// POST /api/v1/libros/{id}/imagen
///
/// Multipart upload with the cover in the `image` field.
pub async fn upload_image(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    ClientMeta(meta): ClientMeta,
    Path(id): Path<DbId>,
    mut multipart: Multipart,
) -> AppResult<Json<DataResponse<Book>>> {
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or("upload").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {e}")))?;
        upload = Some((file_name, data.to_vec()));
    }

    let (file_name, data) = upload.ok_or_else(|| {
        AppError::BadRequest(format!("Missing multipart field '{IMAGE_FIELD}'"))
    })?;
    let book = state
        .books
        .upload_image(&admin.audit_context(meta), id, &file_name, &data)
        .await?;
    Ok(Json(DataResponse::new(book)))
}
