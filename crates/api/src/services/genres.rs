use std::sync::Arc;

use biblioteca_audit::{AuditContext, AuditRecorder, Outcome};
use biblioteca_core::audit::{AuditCategory, AuditDetails};
use biblioteca_core::classify::resources;
use biblioteca_core::error::CoreError;
use biblioteca_core::search::{Page, Pagination};
use biblioteca_core::types::DbId;
use biblioteca_db::models::genre::{CreateGenre, Genre, GenreFilter, UpdateGenre};
use biblioteca_db::models::status::LifecycleTable;
use biblioteca_db::store::{GenreStore, Store};
use serde_json::{json, Value};

use super::lifecycle::LifecycleService;
use super::{log_audit_failure, required_text, validate_input};
use crate::error::AppError;

#[derive(Clone)]
pub struct GenreService {
    store: Arc<dyn Store>,
    lifecycle: LifecycleService,
    recorder: AuditRecorder,
}

fn snapshot(genre: &Genre) -> Value {
    json!({
        "name": genre.name,
        "description": genre.description,
    })
}

impl GenreService {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: LifecycleService,
        recorder: AuditRecorder,
    ) -> Self {
        Self {
            store,
            lifecycle,
            recorder,
        }
    }

    pub async fn find_one(&self, id: DbId) -> Result<Genre, AppError> {
        let genre = GenreStore::find_by_id(self.store.as_ref(), id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Genre",
                id,
            })?;
        Ok(genre)
    }

    async fn ensure_unique(&self, name: &str, exclude_id: Option<DbId>) -> Result<(), AppError> {
        let Some(existing) = self.store.find_by_name(name, exclude_id).await? else {
            return Ok(());
        };
        let msg = if existing.is_deleted() {
            format!(
                "A deleted genre named '{name}' already exists (id {}); restore it instead",
                existing.id
            )
        } else {
            format!("A genre named '{name}' already exists")
        };
        Err(CoreError::Conflict(msg).into())
    }

    pub async fn create(&self, ctx: &AuditContext, input: CreateGenre) -> Result<Genre, AppError> {
        validate_input(&input)?;
        let input = CreateGenre {
            name: required_text("name", &input.name)?,
            ..input
        };
        self.ensure_unique(&input.name, None).await?;

        let active_id = self.lifecycle.resolve_active_id().await?;
        let genre = GenreStore::create(self.store.as_ref(), &input, active_id).await?;

        tracing::info!(genre_id = genre.id, name = %genre.name, "Genre created");
        log_audit_failure(
            self.recorder
                .log_genre_management(
                    ctx,
                    "GENRE_CREATED",
                    Some(genre.id),
                    Outcome::Success,
                    AuditDetails::fields(snapshot(&genre)),
                )
                .await,
            "GENRE_CREATED",
        );
        Ok(genre)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: DbId,
        input: UpdateGenre,
    ) -> Result<Genre, AppError> {
        validate_input(&input)?;
        let current = self.find_one(id).await?;

        let name = input
            .name
            .as_deref()
            .map(|n| required_text("name", n))
            .transpose()?;
        if let Some(name) = &name {
            self.ensure_unique(name, Some(id)).await?;
        }

        let input = UpdateGenre { name, ..input };
        let updated = GenreStore::update(self.store.as_ref(), id, &input)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "Genre",
                id,
            })?;

        log_audit_failure(
            self.recorder
                .log_data_change(
                    ctx,
                    AuditCategory::GenreManagement,
                    "GENRE_UPDATED",
                    resources::GENRES,
                    Some(id),
                    &snapshot(&current),
                    &snapshot(&updated),
                )
                .await,
            "GENRE_UPDATED",
        );
        Ok(updated)
    }

    pub async fn remove(&self, ctx: &AuditContext, id: DbId) -> Result<Genre, AppError> {
        self.lifecycle.delete(LifecycleTable::Genres, id).await?;
        self.record(ctx, "GENRE_DELETED", id).await;
        self.find_one(id).await
    }

    pub async fn restore(&self, ctx: &AuditContext, id: DbId) -> Result<Genre, AppError> {
        self.lifecycle.restore(LifecycleTable::Genres, id).await?;
        self.record(ctx, "GENRE_RESTORED", id).await;
        self.find_one(id).await
    }

    async fn record(&self, ctx: &AuditContext, action: &str, id: DbId) {
        log_audit_failure(
            self.recorder
                .log_genre_management(ctx, action, Some(id), Outcome::Success, AuditDetails::None)
                .await,
            action,
        );
    }

    pub async fn search(
        &self,
        filter: &GenreFilter,
        pagination: Pagination,
    ) -> Result<Page<Genre>, AppError> {
        let (items, total) = GenreStore::search(self.store.as_ref(), filter, pagination).await?;
        Ok(Page::new(items, total, pagination))
    }
}
