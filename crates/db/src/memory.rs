//! In-process store with the same semantics as [`crate::store::PgStore`].
//!
//! Used by the API integration tests and by `STORAGE_BACKEND=memory` local
//! runs. Text filters use the same accent folding the SQL path gets from
//! `unaccent`, and listings use the same ordering.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use biblioteca_core::lifecycle::{LifecycleState, SEED_ACTIVE_ID, SEED_DELETED_ID};
use biblioteca_core::search::{matches_optional, Pagination};
use biblioteca_core::types::DbId;
use chrono::Utc;

use crate::models::book::{Book, BookFilter, CreateBook, UpdateBook};
use crate::models::genre::{CreateGenre, Genre, GenreFilter, UpdateGenre};
use crate::models::status::{LifecycleRow, LifecycleTable, Status, StatusChange};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter};
use crate::store::{BookStore, GenreStore, LifecycleStore, Store, UserStore};

#[derive(Default)]
struct Tables {
    statuses: Vec<Status>,
    books: BTreeMap<DbId, Book>,
    genres: BTreeMap<DbId, Genre>,
    users: BTreeMap<DbId, User>,
    next_id: DbId,
}

impl Tables {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn status_name(&self, id: DbId) -> String {
        self.statuses
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.clone())
            .unwrap_or_default()
    }

    /// Re-resolve the eager-loaded genre name.
    fn hydrate(&self, mut book: Book) -> Book {
        book.genre_name = book
            .genre_id
            .and_then(|id| self.genres.get(&id))
            .map(|g| g.name.clone());
        book
    }
}

/// Thread-safe in-memory store seeded with the `active`/`deleted` statuses.
pub struct MemoryStore {
    tables: RwLock<Tables>,
    status_lookup: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        let now = Utc::now();
        let statuses = [
            (SEED_ACTIVE_ID, LifecycleState::Active),
            (SEED_DELETED_ID, LifecycleState::Deleted),
        ]
        .into_iter()
        .map(|(id, state)| Status {
            id,
            name: state.as_str().to_string(),
            created_at: now,
            updated_at: now,
        })
        .collect();
        Self {
            tables: RwLock::new(Tables {
                statuses,
                ..Tables::default()
            }),
            status_lookup: true,
        }
    }

    /// Make every status lookup by name miss, as if the seed rows were
    /// renamed. Rows keep referencing the seeded ids.
    pub fn without_status_lookup(mut self) -> Self {
        self.status_lookup = false;
        self
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn rank(status_name: &str) -> u8 {
    LifecycleState::from_status_name(status_name)
        .map(LifecycleState::rank)
        .unwrap_or(u8::MAX)
}

fn matches_state(status_name: &str, state: Option<LifecycleState>) -> bool {
    state.map_or(true, |s| s.as_str() == status_name)
}

fn paginate<T>(items: Vec<T>, pagination: Pagination) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let page = items
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.limit as usize)
        .collect();
    (page, total)
}

fn same_text(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[async_trait]
impl LifecycleStore for MemoryStore {
    async fn find_status_by_name(&self, name: &str) -> Result<Option<Status>, sqlx::Error> {
        if !self.status_lookup {
            return Ok(None);
        }
        Ok(self
            .read()
            .statuses
            .iter()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn current_state(
        &self,
        table: LifecycleTable,
        id: DbId,
    ) -> Result<Option<LifecycleRow>, sqlx::Error> {
        let tables = self.read();
        let row = match table {
            LifecycleTable::Books => tables.books.get(&id).map(|b| LifecycleRow {
                status_id: b.status_id,
                status_name: b.status_name.clone(),
                deleted_at: b.deleted_at,
                restored_at: b.restored_at,
            }),
            LifecycleTable::Genres => tables.genres.get(&id).map(|g| LifecycleRow {
                status_id: g.status_id,
                status_name: g.status_name.clone(),
                deleted_at: g.deleted_at,
                restored_at: g.restored_at,
            }),
            LifecycleTable::Users => tables.users.get(&id).map(|u| LifecycleRow {
                status_id: u.status_id,
                status_name: u.status_name.clone(),
                deleted_at: u.deleted_at,
                restored_at: u.restored_at,
            }),
        };
        Ok(row)
    }

    async fn apply_transition(
        &self,
        table: LifecycleTable,
        id: DbId,
        change: &StatusChange,
    ) -> Result<bool, sqlx::Error> {
        let mut tables = self.write();
        let status_name = tables.status_name(change.target_status_id);
        let now = Utc::now();

        macro_rules! apply {
            ($row:expr) => {
                match $row {
                    Some(row) if row.status_id == change.expected_status_id => {
                        row.status_id = change.target_status_id;
                        row.status_name = status_name;
                        row.deleted_at = change.deleted_at;
                        row.restored_at = change.restored_at;
                        row.updated_at = now;
                        true
                    }
                    _ => false,
                }
            };
        }

        let updated = match table {
            LifecycleTable::Books => apply!(tables.books.get_mut(&id)),
            LifecycleTable::Genres => apply!(tables.genres.get_mut(&id)),
            LifecycleTable::Users => apply!(tables.users.get_mut(&id)),
        };
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// Books
// ---------------------------------------------------------------------------

fn book_matches(book: &Book, filter: &BookFilter) -> bool {
    matches_optional(&book.title, filter.title.as_deref())
        && matches_optional(&book.author, filter.author.as_deref())
        && matches_optional(&book.editorial, filter.editorial.as_deref())
        && filter.genre_id.map_or(true, |g| book.genre_id == Some(g))
        && filter.available.map_or(true, |a| book.available == a)
        && matches_state(&book.status_name, filter.state)
}

impl MemoryStore {
    fn filtered_books(&self, filter: &BookFilter) -> Vec<Book> {
        let tables = self.read();
        let mut books: Vec<Book> = tables
            .books
            .values()
            .filter(|b| book_matches(b, filter))
            .map(|b| tables.hydrate(b.clone()))
            .collect();
        books.sort_by(|a, b| {
            (rank(&a.status_name), a.title.to_lowercase(), a.id).cmp(&(
                rank(&b.status_name),
                b.title.to_lowercase(),
                b.id,
            ))
        });
        books
    }
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Book>, sqlx::Error> {
        let tables = self.read();
        Ok(tables.books.get(&id).cloned().map(|b| tables.hydrate(b)))
    }

    async fn find_by_natural_key(
        &self,
        title: &str,
        editorial: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Book>, sqlx::Error> {
        let tables = self.read();
        let found = tables
            .books
            .values()
            .filter(|b| Some(b.id) != exclude_id)
            .find(|b| same_text(&b.title, title) && same_text(&b.editorial, editorial))
            .cloned()
            .map(|b| tables.hydrate(b));
        Ok(found)
    }

    async fn create(&self, input: &CreateBook, status_id: DbId) -> Result<Book, sqlx::Error> {
        let mut tables = self.write();
        let now = Utc::now();
        let book = Book {
            id: tables.next_id(),
            title: input.title.trim().to_string(),
            author: input.author.trim().to_string(),
            editorial: input.editorial.trim().to_string(),
            price: input.price,
            genre_id: input.genre_id,
            genre_name: None,
            available: input.available.unwrap_or(true),
            image_url: None,
            status_id,
            status_name: tables.status_name(status_id),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            restored_at: None,
        };
        tables.books.insert(book.id, book.clone());
        Ok(tables.hydrate(book))
    }

    async fn update(&self, id: DbId, input: &UpdateBook) -> Result<Option<Book>, sqlx::Error> {
        let mut tables = self.write();
        let Some(book) = tables.books.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &input.title {
            book.title = title.trim().to_string();
        }
        if let Some(author) = &input.author {
            book.author = author.trim().to_string();
        }
        if let Some(editorial) = &input.editorial {
            book.editorial = editorial.trim().to_string();
        }
        if let Some(price) = input.price {
            book.price = price;
        }
        if let Some(genre_id) = input.genre_id {
            book.genre_id = Some(genre_id);
        }
        if let Some(available) = input.available {
            book.available = available;
        }
        book.updated_at = Utc::now();
        let book = book.clone();
        Ok(Some(tables.hydrate(book)))
    }

    async fn set_image_url(&self, id: DbId, image_url: &str) -> Result<Option<Book>, sqlx::Error> {
        let mut tables = self.write();
        let Some(book) = tables.books.get_mut(&id) else {
            return Ok(None);
        };
        book.image_url = Some(image_url.to_string());
        book.updated_at = Utc::now();
        let book = book.clone();
        Ok(Some(tables.hydrate(book)))
    }

    async fn search(
        &self,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Book>, i64), sqlx::Error> {
        Ok(paginate(self.filtered_books(filter), pagination))
    }

    async fn list_for_export(&self, filter: &BookFilter) -> Result<Vec<Book>, sqlx::Error> {
        Ok(self.filtered_books(filter))
    }
}

// ---------------------------------------------------------------------------
// Genres
// ---------------------------------------------------------------------------

#[async_trait]
impl GenreStore for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<Genre>, sqlx::Error> {
        Ok(self.read().genres.get(&id).cloned())
    }

    async fn find_by_name(
        &self,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Genre>, sqlx::Error> {
        Ok(self
            .read()
            .genres
            .values()
            .filter(|g| Some(g.id) != exclude_id)
            .find(|g| same_text(&g.name, name))
            .cloned())
    }

    async fn create(&self, input: &CreateGenre, status_id: DbId) -> Result<Genre, sqlx::Error> {
        let mut tables = self.write();
        let now = Utc::now();
        let genre = Genre {
            id: tables.next_id(),
            name: input.name.trim().to_string(),
            description: input.description.clone(),
            status_id,
            status_name: tables.status_name(status_id),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            restored_at: None,
        };
        tables.genres.insert(genre.id, genre.clone());
        Ok(genre)
    }

    async fn update(&self, id: DbId, input: &UpdateGenre) -> Result<Option<Genre>, sqlx::Error> {
        let mut tables = self.write();
        let Some(genre) = tables.genres.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &input.name {
            genre.name = name.trim().to_string();
        }
        if let Some(description) = &input.description {
            genre.description = Some(description.clone());
        }
        genre.updated_at = Utc::now();
        Ok(Some(genre.clone()))
    }

    async fn search(
        &self,
        filter: &GenreFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Genre>, i64), sqlx::Error> {
        let mut genres: Vec<Genre> = self
            .read()
            .genres
            .values()
            .filter(|g| {
                matches_optional(&g.name, filter.name.as_deref())
                    && matches_state(&g.status_name, filter.state)
            })
            .cloned()
            .collect();
        genres.sort_by(|a, b| {
            (rank(&a.status_name), a.name.to_lowercase(), a.id).cmp(&(
                rank(&b.status_name),
                b.name.to_lowercase(),
                b.id,
            ))
        });
        Ok(paginate(genres, pagination))
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_id(&self, id: DbId) -> Result<Option<User>, sqlx::Error> {
        Ok(self.read().users.get(&id).cloned())
    }

    async fn find_by_email(
        &self,
        email: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<User>, sqlx::Error> {
        Ok(self
            .read()
            .users
            .values()
            .filter(|u| Some(u.id) != exclude_id)
            .find(|u| same_text(&u.email, email))
            .cloned())
    }

    async fn create(&self, input: &CreateUser, status_id: DbId) -> Result<User, sqlx::Error> {
        let mut tables = self.write();
        let now = Utc::now();
        let user = User {
            id: tables.next_id(),
            email: input.email.trim().to_string(),
            name: input.name.trim().to_string(),
            password_hash: input.password_hash.clone(),
            role: input.role.clone(),
            status_id,
            status_name: tables.status_name(status_id),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            restored_at: None,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update(&self, id: DbId, input: &UpdateUser) -> Result<Option<User>, sqlx::Error> {
        let mut tables = self.write();
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(email) = &input.email {
            user.email = email.trim().to_string();
        }
        if let Some(name) = &input.name {
            user.name = name.trim().to_string();
        }
        if let Some(hash) = &input.password_hash {
            user.password_hash = hash.clone();
        }
        if let Some(role) = &input.role {
            user.role = role.clone();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn search(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let mut users: Vec<User> = self
            .read()
            .users
            .values()
            .filter(|u| {
                matches_optional(&u.name, filter.name.as_deref())
                    && matches_optional(&u.email, filter.email.as_deref())
                    && filter.role.as_deref().map_or(true, |r| u.role == r)
                    && matches_state(&u.status_name, filter.state)
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            (rank(&a.status_name), a.name.to_lowercase(), a.id).cmp(&(
                rank(&b.status_name),
                b.name.to_lowercase(),
                b.id,
            ))
        });
        Ok(paginate(users, pagination))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book(title: &str, editorial: &str) -> CreateBook {
        CreateBook {
            title: title.to_string(),
            author: "Autor".to_string(),
            editorial: editorial.to_string(),
            price: 10.0,
            genre_id: None,
            available: None,
        }
    }

    fn delete_change() -> StatusChange {
        StatusChange {
            expected_status_id: SEED_ACTIVE_ID,
            target_status_id: SEED_DELETED_ID,
            deleted_at: Some(Utc::now()),
            restored_at: None,
        }
    }

    #[tokio::test]
    async fn conditional_transition_applies_once() {
        let store = MemoryStore::new();
        let book = BookStore::create(&store, &new_book("Rayuela", "Sudamericana"), SEED_ACTIVE_ID)
            .await
            .unwrap();
        assert_eq!(book.status_name, "active");

        let change = delete_change();
        let first = store
            .apply_transition(LifecycleTable::Books, book.id, &change)
            .await
            .unwrap();
        let second = store
            .apply_transition(LifecycleTable::Books, book.id, &change)
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        let row = store
            .current_state(LifecycleTable::Books, book.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.state(), Some(LifecycleState::Deleted));
        assert!(row.deleted_at.is_some());
    }

    #[tokio::test]
    async fn transition_on_missing_row_is_false() {
        let store = MemoryStore::new();
        let applied = store
            .apply_transition(LifecycleTable::Genres, 42, &delete_change())
            .await
            .unwrap();
        assert!(!applied);
        let row = store
            .current_state(LifecycleTable::Genres, 42)
            .await
            .unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn natural_key_is_case_insensitive_and_honours_exclusion() {
        let store = MemoryStore::new();
        let book = BookStore::create(&store, &new_book("Ficciones", "Sur"), SEED_ACTIVE_ID)
            .await
            .unwrap();
        let found = store
            .find_by_natural_key("FICCIONES", "sur", None)
            .await
            .unwrap();
        assert_eq!(found.map(|b| b.id), Some(book.id));
        let excluded = store
            .find_by_natural_key("ficciones", "Sur", Some(book.id))
            .await
            .unwrap();
        assert!(excluded.is_none());
    }

    #[tokio::test]
    async fn search_orders_active_first_then_title() {
        let store = MemoryStore::new();
        let zeta = BookStore::create(&store, &new_book("Zeta", "E"), SEED_ACTIVE_ID)
            .await
            .unwrap();
        let alfa = BookStore::create(&store, &new_book("alfa", "E"), SEED_ACTIVE_ID)
            .await
            .unwrap();
        let beta = BookStore::create(&store, &new_book("Beta", "E"), SEED_ACTIVE_ID)
            .await
            .unwrap();
        store
            .apply_transition(LifecycleTable::Books, alfa.id, &delete_change())
            .await
            .unwrap();

        let (items, total) =
            BookStore::search(&store, &BookFilter::default(), Pagination::default())
                .await
                .unwrap();
        assert_eq!(total, 3);
        let ids: Vec<DbId> = items.iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![beta.id, zeta.id, alfa.id]);
    }

    #[tokio::test]
    async fn genre_name_is_eager_loaded() {
        let store = MemoryStore::new();
        let genre = GenreStore::create(
            &store,
            &CreateGenre {
                name: "Novela".to_string(),
                description: None,
            },
            SEED_ACTIVE_ID,
        )
        .await
        .unwrap();
        let mut input = new_book("Pedro Páramo", "FCE");
        input.genre_id = Some(genre.id);
        let book = BookStore::create(&store, &input, SEED_ACTIVE_ID)
            .await
            .unwrap();
        assert_eq!(book.genre_name.as_deref(), Some("Novela"));
    }

    #[tokio::test]
    async fn status_lookup_can_be_disabled() {
        let store = MemoryStore::new().without_status_lookup();
        assert!(store.find_status_by_name("active").await.unwrap().is_none());
    }
}
