//! Repository for the `genres` table.

use biblioteca_core::search::Pagination;
use biblioteca_core::types::DbId;
use sqlx::PgPool;

use super::filter::{bind_values, bind_values_scalar, BindValue, Conditions, STATE_ORDER};
use crate::models::genre::{CreateGenre, Genre, GenreFilter, UpdateGenre};

/// Column list for the joined genre projection (`g` = genre, `s` = status).
const COLUMNS: &str = "\
    g.id, g.name, g.description, g.status_id, s.name AS status_name, \
    g.created_at, g.updated_at, g.deleted_at, g.restored_at";

const JOINS: &str = "JOIN statuses s ON s.id = g.status_id";

/// Provides CRUD and search operations for genres.
pub struct GenreRepo;

impl GenreRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Genre>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM genres g {JOINS} WHERE g.id = $1");
        sqlx::query_as::<_, Genre>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a genre by name (case-insensitive), optionally ignoring one id.
    pub async fn find_by_name(
        pool: &PgPool,
        name: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<Genre>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM genres g {JOINS} \
             WHERE LOWER(g.name) = LOWER($1) AND ($2::BIGINT IS NULL OR g.id <> $2) \
             LIMIT 1"
        );
        sqlx::query_as::<_, Genre>(&query)
            .bind(name)
            .bind(exclude_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create(
        pool: &PgPool,
        input: &CreateGenre,
        status_id: DbId,
    ) -> Result<Genre, sqlx::Error> {
        let query = format!(
            "WITH g AS ( \
                INSERT INTO genres (name, description, status_id) VALUES ($1, $2, $3) \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM g {JOINS}"
        );
        sqlx::query_as::<_, Genre>(&query)
            .bind(input.name.trim())
            .bind(&input.description)
            .bind(status_id)
            .fetch_one(pool)
            .await
    }

    /// Update a genre. Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateGenre,
    ) -> Result<Option<Genre>, sqlx::Error> {
        let query = format!(
            "WITH g AS ( \
                UPDATE genres SET \
                    name = COALESCE($2, name), \
                    description = COALESCE($3, description) \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM g {JOINS}"
        );
        sqlx::query_as::<_, Genre>(&query)
            .bind(id)
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.description)
            .fetch_optional(pool)
            .await
    }

    /// One page of genres matching `filter`, active first then by name.
    pub async fn search(
        pool: &PgPool,
        filter: &GenreFilter,
        pagination: Pagination,
    ) -> Result<(Vec<Genre>, i64), sqlx::Error> {
        let (where_clause, binds, bind_idx) = build_genre_filter(filter);

        let query = format!(
            "SELECT {COLUMNS} FROM genres g {JOINS} {where_clause} \
             ORDER BY {STATE_ORDER}, LOWER(g.name), g.id \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );
        let items = bind_values(sqlx::query_as::<_, Genre>(&query), &binds)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(pool)
            .await?;

        let count_query =
            format!("SELECT COUNT(*)::BIGINT FROM genres g {JOINS} {where_clause}");
        let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_query), &binds)
            .fetch_one(pool)
            .await?;

        Ok((items, total))
    }
}

fn build_genre_filter(filter: &GenreFilter) -> (String, Vec<BindValue>, u32) {
    let mut c = Conditions::new();
    c.text_match("g.name", filter.name.as_deref());
    c.state(filter.state);
    c.finish()
}
