//! Storage traits the domain services program against.
//!
//! [`PgStore`] delegates to the repositories; [`crate::memory::MemoryStore`]
//! keeps everything in process with the same semantics.

use async_trait::async_trait;
use biblioteca_core::search::Pagination;
use biblioteca_core::types::DbId;
use sqlx::PgPool;

use crate::models::book::{Book, BookFilter, CreateBook, UpdateBook};
use crate::models::genre::{CreateGenre, Genre, GenreFilter, UpdateGenre};
use crate::models::status::{LifecycleRow, LifecycleTable, Status, StatusChange};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter};
use crate::repositories::{BookRepo, GenreRepo, LifecycleRepo, StatusRepo, UserRepo};

/// Status lookups and guarded status writes.
#[async_trait]
pub trait LifecycleStore: Send + Sync {
    async fn find_status_by_name(&self, name: &str) -> Result<Option<Status>, sqlx::Error>;

    async fn current_state(
        &self,
        table: LifecycleTable,
        id: DbId,
    ) -> Result<Option<LifecycleRow>, sqlx::Error>;

    /// Returns `true` if the row was in `change.expected_status_id` and has
    /// been updated.
    async fn apply_transition(
        &self,
        table: LifecycleTable,
        id: DbId,
        change: &StatusChange,
    ) -> Result<bool, sqlx::Error>;
}

#[async_trait]
pub trait BookStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Book>, sqlx::Error>;

    async fn find_by_natural_key(
        &self,
        title: &str,
        editorial: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Book>, sqlx::Error>;

    async fn create(&self, input: &CreateBook, status_id: DbId) -> Result<Book, sqlx::Error>;

    async fn update(&self, id: DbId, input: &UpdateBook) -> Result<Option<Book>, sqlx::Error>;

    async fn set_image_url(&self, id: DbId, image_url: &str) -> Result<Option<Book>, sqlx::Error>;

    async fn search(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Book>, i64), sqlx::Error>;

    async fn list_for_export(&self, filter: &BookFilter) -> Result<Vec<Book>, sqlx::Error>;
}

#[async_trait]
pub trait GenreStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Genre>, sqlx::Error>;

    async fn find_by_name(
        &self,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Genre>, sqlx::Error>;

    async fn create(&self, input: &CreateGenre, status_id: DbId) -> Result<Genre, sqlx::Error>;

    async fn update(&self, id: DbId, input: &UpdateGenre) -> Result<Option<Genre>, sqlx::Error>;

    async fn search(
        &self,
        filter: &GenreFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Genre>, i64), sqlx::Error>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, sqlx::Error>;

    async fn find_by_email(
        &self,
        email: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<User>, sqlx::Error>;

    async fn create(&self, input: &CreateUser, status_id: DbId) -> Result<User, sqlx::Error>;

    async fn update(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, sqlx::Error>;

    async fn search(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64), sqlx::Error>;
}

/// Everything the domain services need from persistence.
#[async_trait]
pub trait Store: LifecycleStore + BookStore + GenreStore + UserStore {
    /// Verify the backend is reachable.
    async fn ping(&self) -> Result<(), sqlx::Error>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl LifecycleStore for PgStore {
    async fn find_status_by_name(&self, name: &str) -> Result<Option<Status>, sqlx::Error> {
        StatusRepo::find_by_name(&self.pool, name).await
    }

    async fn current_state(
        &self,
        table: LifecycleTable,
        id: DbId,
    ) -> Result<Option<LifecycleRow>, sqlx::Error> {
        LifecycleRepo::current(&self.pool, table, id).await
    }

    async fn apply_transition(
        &self,
        table: LifecycleTable,
        id: DbId,
        change: &StatusChange,
    ) -> Result<bool, sqlx::Error> {
        LifecycleRepo::apply(&self.pool, table, id, change).await
    }
}

#[async_trait]
impl BookStore for PgStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Book>, sqlx::Error> {
        BookRepo::find_by_id(&self.pool, id).await
    }

    async fn find_by_natural_key(
        &self,
        title: &str,
        editorial: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Book>, sqlx::Error> {
        BookRepo::find_by_natural_key(&self.pool, title, editorial, exclude_id).await
    }

    async fn create(&self, input: &CreateBook, status_id: DbId) -> Result<Book, sqlx::Error> {
        BookRepo::create(&self.pool, input, status_id).await
    }

    async fn update(&self, id: DbId, input: &UpdateBook) -> Result<Option<Book>, sqlx::Error> {
        BookRepo::update(&self.pool, id, input).await
    }

    async fn set_image_url(&self, id: DbId, image_url: &str) -> Result<Option<Book>, sqlx::Error> {
        BookRepo::set_image_url(&self.pool, id, image_url).await
    }

    async fn search(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Book>, i64), sqlx::Error> {
        BookRepo::search(&self.pool, filter, pagination).await
    }

    async fn list_for_export(&self, filter: &BookFilter) -> Result<Vec<Book>, sqlx::Error> {
        BookRepo::list_for_export(&self.pool, filter).await
    }
}

#[async_trait]
impl GenreStore for PgStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Genre>, sqlx::Error> {
        GenreRepo::find_by_id(&self.pool, id).await
    }

    async fn find_by_name(
        &self,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Genre>, sqlx::Error> {
        GenreRepo::find_by_name(&self.pool, name, exclude_id).await
    }

    async fn create(&self, input: &CreateGenre, status_id: DbId) -> Result<Genre, sqlx::Error> {
        GenreRepo::create(&self.pool, input, status_id).await
    }

    async fn update(&self, id: DbId, input: &UpdateGenre) -> Result<Option<Genre>, sqlx::Error> {
        GenreRepo::update(&self.pool, id, input).await
    }

    async fn search(
        &self,
        filter: &GenreFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Genre>, i64), sqlx::Error> {
        GenreRepo::search(&self.pool, filter, pagination).await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, sqlx::Error> {
        UserRepo::find_by_id(&self.pool, id).await
    }

    async fn find_by_email(
        &self,
        email: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<User>, sqlx::Error> {
        UserRepo::find_by_email(&self.pool, email, exclude_id).await
    }

    async fn create(&self, input: &CreateUser, status_id: DbId) -> Result<User, sqlx::Error> {
        UserRepo::create(&self.pool, input, status_id).await
    }

    async fn update(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, sqlx::Error> {
        UserRepo::update(&self.pool, id, input).await
    }

    async fn search(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        UserRepo::search(&self.pool, filter, pagination).await
    }
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        crate::health_check(&self.pool).await
    }
}
