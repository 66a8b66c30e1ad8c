//! Book catalogue: CRUD over the lifecycle, search, CSV export, and cover
//! image upload.

use std::path::PathBuf;
use std::sync::Arc;

use biblioteca_audit::{AuditContext, AuditRecorder, Outcome};
use biblioteca_core::audit::{AuditCategory, AuditDetails};
use biblioteca_core::classify::resources;
use biblioteca_core::csv::{Cell, CsvBuilder};
use biblioteca_core::error::CoreError;
use biblioteca_core::lifecycle::LifecycleState;
use biblioteca_core::search::{estado_label, Page, Pagination};
use biblioteca_core::types::DbId;
use biblioteca_db::models::book::{Book, BookFilter, CreateBook, UpdateBook};
use biblioteca_db::models::status::LifecycleTable;
use biblioteca_db::store::{BookStore, GenreStore, Store};
use serde_json::{json, Value};

use super::lifecycle::LifecycleService;
use super::{log_audit_failure, required_text, validate_input};
use crate::error::AppError;

pub const CSV_HEADER: [&str; 10] = [
    "ID",
    "Título",
    "Autor",
    "Editorial",
    "Precio",
    "Género",
    "Estado",
    "Disponibilidad",
    "Fecha Creación",
    "Fecha Actualización",
];

/// Largest accepted cover image.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif"];

#[derive(Clone)]
pub struct BookService {
    store: Arc<dyn Store>,
    lifecycle: LifecycleService,
    recorder: AuditRecorder,
    upload_dir: PathBuf,
}

/// Fields compared when recording an update.
fn snapshot(book: &Book) -> Value {
    json!({
        "title": book.title,
        "author": book.author,
        "editorial": book.editorial,
        "price": book.price,
        "genre_id": book.genre_id,
        "available": book.available,
    })
}

fn availability_label(available: bool) -> &'static str {
    if available {
        "Disponible"
    } else {
        "No disponible"
    }
}

impl BookService {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: LifecycleService,
        recorder: AuditRecorder,
        upload_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            lifecycle,
            recorder,
            upload_dir,
        }
    }

    pub async fn find_one(&self, id: DbId) -> Result<Book, AppError> {
        BookStore::find_by_id(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "Book", id }.into())
    }

    /// Reject a (title, editorial) pair already used by another book.
    async fn ensure_unique(
        &self,
        title: &str,
        editorial: &str,
        exclude_id: Option<DbId>,
    ) -> Result<(), AppError> {
        let Some(existing) = self
            .store
            .find_by_natural_key(title, editorial, exclude_id)
            .await?
        else {
            return Ok(());
        };
        let msg = if existing.is_deleted() {
            format!(
                "A deleted book titled '{title}' from '{editorial}' already exists (id {}); restore it instead",
                existing.id
            )
        } else {
            format!("A book titled '{title}' from '{editorial}' already exists")
        };
        Err(CoreError::Conflict(msg).into())
    }

    /// The referenced genre must exist and be active.
    async fn ensure_genre(&self, genre_id: Option<DbId>) -> Result<(), AppError> {
        let Some(id) = genre_id else {
            return Ok(());
        };
        let genre = GenreStore::find_by_id(self.store.as_ref(), id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Genre",
                id,
            })?;
        if genre.is_deleted() {
            return Err(CoreError::Validation(format!(
                "Genre '{}' is deleted and cannot be assigned",
                genre.name
            ))
            .into());
        }
        Ok(())
    }

    pub async fn create(&self, ctx: &AuditContext, input: CreateBook) -> Result<Book, AppError> {
        validate_input(&input)?;
        let input = CreateBook {
            title: required_text("title", &input.title)?,
            author: required_text("author", &input.author)?,
            editorial: required_text("editorial", &input.editorial)?,
            ..input
        };
        self.ensure_unique(&input.title, &input.editorial, None)
            .await?;
        self.ensure_genre(input.genre_id).await?;

        let active_id = self.lifecycle.resolve_active_id().await?;
        let book = BookStore::create(self.store.as_ref(), &input, active_id).await?;

        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        log_audit_failure(
            self.recorder
                .log_book_management(
                    ctx,
                    "BOOK_CREATED",
                    Some(book.id),
                    Outcome::Success,
                    AuditDetails::fields(snapshot(&book)),
                )
                .await,
            "BOOK_CREATED",
        );
        Ok(book)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: DbId,
        input: UpdateBook,
    ) -> Result<Book, AppError> {
        validate_input(&input)?;
        let current = self.find_one(id).await?;

        let title = input
            .title
            .as_deref()
            .map(|t| required_text("title", t))
            .transpose()?;
        let editorial = input
            .editorial
            .as_deref()
            .map(|e| required_text("editorial", e))
            .transpose()?;
        if title.is_some() || editorial.is_some() {
            let new_title = title.as_deref().unwrap_or(&current.title);
            let new_editorial = editorial.as_deref().unwrap_or(&current.editorial);
            self.ensure_unique(new_title, new_editorial, Some(id))
                .await?;
        }
        self.ensure_genre(input.genre_id).await?;

        let input = UpdateBook {
            title,
            editorial,
            ..input
        };
        let updated = BookStore::update(self.store.as_ref(), id, &input)
            .await?
            .ok_or(CoreError::NotFound { entity: "Book", id })?;

        log_audit_failure(
            self.recorder
                .log_data_change(
                    ctx,
                    AuditCategory::BookManagement,
                    "BOOK_UPDATED",
                    resources::BOOKS,
                    Some(id),
                    &snapshot(&current),
                    &snapshot(&updated),
                )
                .await,
            "BOOK_UPDATED",
        );
        Ok(updated)
    }

    pub async fn remove(&self, ctx: &AuditContext, id: DbId) -> Result<Book, AppError> {
        self.lifecycle.delete(LifecycleTable::Books, id).await?;
        self.record(ctx, "BOOK_DELETED", id).await;
        self.find_one(id).await
    }

    pub async fn restore(&self, ctx: &AuditContext, id: DbId) -> Result<Book, AppError> {
        self.lifecycle.restore(LifecycleTable::Books, id).await?;
        self.record(ctx, "BOOK_RESTORED", id).await;
        self.find_one(id).await
    }

    async fn record(&self, ctx: &AuditContext, action: &str, id: DbId) {
        log_audit_failure(
            self.recorder
                .log_book_management(ctx, action, Some(id), Outcome::Success, AuditDetails::None)
                .await,
            action,
        );
    }

    pub async fn search(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<Page<Book>, AppError> {
        let (items, total) = BookStore::search(self.store.as_ref(), filter, pagination).await?;
        Ok(Page::new(items, total, pagination))
    }

    /// Every book matching `filter`, as a CSV document.
    pub async fn export_to_csv(
        &self,
        ctx: &AuditContext,
        filter: &BookFilter,
    ) -> Result<String, AppError> {
        let books = self.store.list_for_export(filter).await?;

        let mut csv = CsvBuilder::new(&CSV_HEADER);
        for book in &books {
            let state = book.state().unwrap_or(LifecycleState::Active);
            csv.push_row(&[
                Cell::number(book.id),
                Cell::text(book.title.as_str()),
                Cell::text(book.author.as_str()),
                Cell::text(book.editorial.as_str()),
                Cell::number(book.price),
                Cell::text(book.genre_name.clone().unwrap_or_default()),
                Cell::text(estado_label(state)),
                Cell::text(availability_label(book.available)),
                Cell::date(book.created_at),
                Cell::date(book.updated_at),
            ]);
        }

        log_audit_failure(
            self.recorder
                .log_data_access(
                    ctx,
                    "BOOKS_EXPORTED",
                    resources::BOOKS,
                    None,
                    Outcome::Success,
                    AuditDetails::fields(json!({ "rows": books.len() })),
                )
                .await,
            "BOOKS_EXPORTED",
        );
        Ok(csv.finish())
    }

    /// Store a cover image under `<upload_dir>/books/` and point the book at
    /// it.
    pub async fn upload_image(
        &self,
        ctx: &AuditContext,
        id: DbId,
        file_name: &str,
        data: &[u8],
    ) -> Result<Book, AppError> {
        let ext = image_extension(file_name)?;
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded image is empty".into()));
        }
        if data.len() > MAX_IMAGE_BYTES {
            return Err(AppError::BadRequest(format!(
                "Image exceeds the {} MiB limit",
                MAX_IMAGE_BYTES / (1024 * 1024)
            )));
        }

        let book = self.find_one(id).await?;
        if book.is_deleted() {
            return Err(CoreError::Conflict(format!(
                "Book with id {id} is deleted; restore it before uploading an image"
            ))
            .into());
        }

        let dir = self.upload_dir.join("books");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to create upload dir: {e}")))?;
        let stored = format!("book_{id}_{}.{ext}", chrono::Utc::now().timestamp_millis());
        tokio::fs::write(dir.join(&stored), data)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to store image: {e}")))?;

        let url = format!("/uploads/books/{stored}");
        let updated = self
            .store
            .set_image_url(id, &url)
            .await?
            .ok_or(CoreError::NotFound { entity: "Book", id })?;

        tracing::info!(book_id = id, bytes = data.len(), %url, "Book image stored");
        log_audit_failure(
            self.recorder
                .log_book_management(
                    ctx,
                    "BOOK_IMAGE_UPLOADED",
                    Some(id),
                    Outcome::Success,
                    AuditDetails::fields(json!({ "imageUrl": url, "bytes": data.len() })),
                )
                .await,
            "BOOK_IMAGE_UPLOADED",
        );
        Ok(updated)
    }
}

/// Lowercase extension of an accepted image file name.
pub fn image_extension(file_name: &str) -> Result<String, AppError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(AppError::BadRequest(format!(
            "Unsupported image format '{file_name}'. Supported: {}",
            ALLOWED_IMAGE_EXTENSIONS.join(", ")
        )))
    }
}
