//! Repository for the `books` table.

use biblioteca_core::search::Pagination;
use biblioteca_core::types::DbId;
use sqlx::PgPool;

use super::filter::{bind_values, bind_values_scalar, BindValue, Conditions, STATE_ORDER};
use crate::models::book::{Book, BookFilter, CreateBook, UpdateBook};

/// Column list for the joined book projection. Every query aliases the book
/// row as `b`.
const COLUMNS: &str = "\
    b.id, b.title, b.author, b.editorial, b.price, b.genre_id, \
    g.name AS genre_name, b.available, b.image_url, b.status_id, \
    s.name AS status_name, b.created_at, b.updated_at, b.deleted_at, b.restored_at";

/// Eager-loads the status and genre names.
const JOINS: &str = "\
    JOIN statuses s ON s.id = b.status_id \
    LEFT JOIN genres g ON g.id = b.genre_id";

/// Provides CRUD and search operations for books.
pub struct BookRepo;

impl BookRepo {
    /// Find a book by id, regardless of status.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Book>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM books b {JOINS} WHERE b.id = $1");
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a book by its natural key (title + editorial, case-insensitive),
    /// optionally ignoring one id (the row being updated).
    pub async fn find_by_natural_key(
        pool: &PgPool,
        title: &str,
        editorial: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Book>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM books b {JOINS} \
             WHERE LOWER(b.title) = LOWER($1) AND LOWER(b.editorial) = LOWER($2) \
               AND ($3::BIGINT IS NULL OR b.id <> $3) \
             LIMIT 1"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(title)
            .bind(editorial)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await
    }

    /// Insert a new book with the given initial status.
    pub async fn create(
        pool: &PgPool,
        input: &CreateBook,
        status_id: DbId,
    ) -> Result<Book, sqlx::Error> {
        let query = format!(
            "WITH b AS ( \
                INSERT INTO books (title, author, editorial, price, genre_id, available, status_id) \
                VALUES ($1, $2, $3, $4, $5, COALESCE($6, TRUE), $7) \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM b {JOINS}"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(input.title.trim())
            .bind(input.author.trim())
            .bind(input.editorial.trim())
            .bind(input.price)
            .bind(input.genre_id)
            .bind(input.available)
            .bind(status_id)
            .fetch_one(pool)
            .await
    }

    /// Update a book. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateBook,
    ) -> Result<Option<Book>, sqlx::Error> {
        let query = format!(
            "WITH b AS ( \
                UPDATE books SET \
                    title = COALESCE($2, title), \
                    author = COALESCE($3, author), \
                    editorial = COALESCE($4, editorial), \
                    price = COALESCE($5, price), \
                    genre_id = COALESCE($6, genre_id), \
                    available = COALESCE($7, available) \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM b {JOINS}"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .bind(input.title.as_deref().map(str::trim))
            .bind(input.author.as_deref().map(str::trim))
            .bind(input.editorial.as_deref().map(str::trim))
            .bind(input.price)
            .bind(input.genre_id)
            .bind(input.available)
            .fetch_optional(pool)
            .await
    }

    /// Point a book at a newly uploaded cover image.
    pub async fn set_image_url(
        pool: &PgPool,
        id: DbId,
        image_url: &str,
    ) -> Result<Option<Book>, sqlx::Error> {
        let query = format!(
            "WITH b AS (UPDATE books SET image_url = $2 WHERE id = $1 RETURNING *) \
             SELECT {COLUMNS} FROM b {JOINS}"
        );
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .bind(image_url)
            .fetch_optional(pool)
            .await
    }

    /// One page of books matching `filter`, active first then by title,
    /// together with the total match count.
    pub async fn search(
        pool: &PgPool,
        filter: &BookFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Book>, i64), sqlx::Error> {
        let (where_clause, binds, bind_idx) = build_book_filter(filter);

        let query = format!(
            "SELECT {COLUMNS} FROM books b {JOINS} {where_clause} \
             ORDER BY {STATE_ORDER}, LOWER(b.title), b.id \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );
        let items = bind_values(sqlx::query_as::<_, Book>(&query), &binds)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(pool)
            .await?;

        let count_query =
            format!("SELECT COUNT(*)::BIGINT FROM books b {JOINS} {where_clause}");
        let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_query), &binds)
            .fetch_one(pool)
            .await?;

        Ok((items, total))
    }

    /// Every book matching `filter`, in listing order. Used by the CSV export.
    pub async fn list_for_export(
        pool: &PgPool,
        filter: &BookFilter,
    ) -> Result<Vec<Book>, sqlx::Error> {
        let (where_clause, binds, _) = build_book_filter(filter);
        let query = format!(
            "SELECT {COLUMNS} FROM books b {JOINS} {where_clause} \
             ORDER BY {STATE_ORDER}, LOWER(b.title), b.id"
        );
        bind_values(sqlx::query_as::<_, Book>(&query), &binds)
            .fetch_all(pool)
            .await
    }
}

fn build_book_filter(filter: &BookFilter) -> (String, Vec<BindValue>, u32) {
    let mut c = Conditions::new();
    c.text_match("b.title", filter.title.as_deref());
    c.text_match("b.author", filter.author.as_deref());
    c.text_match("b.editorial", filter.editorial.as_deref());
    c.eq_id("b.genre_id", filter.genre_id);
    c.eq_bool("b.available", filter.available);
    c.state(filter.state);
    c.finish()
}
