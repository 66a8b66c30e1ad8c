//! Repository for the `users` table.

use biblioteca_core::search::Pagination;
use biblioteca_core::types::DbId;
use sqlx::PgPool;

use super::filter::{bind_values, bind_values_scalar, BindValue, Conditions, STATE_ORDER};
use crate::models::user::{CreateUser, UpdateUser, User, UserFilter};

/// Column list shared across queries (`u` = user, `s` = status).
const COLUMNS: &str = "\
    u.id, u.email, u.name, u.password_hash, u.role, u.status_id, \
    s.name AS status_name, u.created_at, u.updated_at, u.deleted_at, u.restored_at";

const JOINS: &str = "JOIN statuses s ON s.id = u.status_id";

/// Provides CRUD and search operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(
        pool: &PgPool,
        input: &CreateUser,
        status_id: DbId,
    ) -> Result<User, sqlx::Error> {
        let query = format!(
            "WITH u AS ( \
                INSERT INTO users (email, name, password_hash, role, status_id) \
                VALUES ($1, $2, $3, $4, $5) \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM u {JOINS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(input.email.trim())
            .bind(input.name.trim())
            .bind(&input.password_hash)
            .bind(&input.role)
            .bind(status_id)
            .fetch_one(pool)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users u {JOINS} WHERE u.id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email (case-insensitive), optionally ignoring one id.
    pub async fn find_by_email(
        pool: &PgPool,
        email: &str,
        exclude_id: Option<DbId>,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users u {JOINS} \
             WHERE LOWER(u.email) = LOWER($1) AND ($2::BIGINT IS NULL OR u.id <> $2) \
             LIMIT 1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(email.trim())
            .bind(exclude_id)
            .fetch_optional(pool)
            .await
    }

    /// Update a user. Only non-`None` fields in `input` are applied.
    ///
    /// Returns `None` if no row with the given `id` exists.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateUser,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "WITH u AS ( \
                UPDATE users SET \
                    email = COALESCE($2, email), \
                    name = COALESCE($3, name), \
                    password_hash = COALESCE($4, password_hash), \
                    role = COALESCE($5, role) \
                WHERE id = $1 \
                RETURNING * \
             ) \
             SELECT {COLUMNS} FROM u {JOINS}"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(input.email.as_deref().map(str::trim))
            .bind(input.name.as_deref().map(str::trim))
            .bind(&input.password_hash)
            .bind(&input.role)
            .fetch_optional(pool)
            .await
    }

    /// One page of users matching `filter`, active first then by name.
    pub async fn search(
        pool: &PgPool,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let (where_clause, binds, bind_idx) = build_user_filter(filter);

        let query = format!(
            "SELECT {COLUMNS} FROM users u {JOINS} {where_clause} \
             ORDER BY {STATE_ORDER}, LOWER(u.name), u.id \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );
        let items = bind_values(sqlx::query_as::<_, User>(&query), &binds)
            .bind(pagination.limit)
            .bind(pagination.offset())
            .fetch_all(pool)
            .await?;

        let count_query = format!("SELECT COUNT(*)::BIGINT FROM users u {JOINS} {where_clause}");
        let total = bind_values_scalar(sqlx::query_scalar::<_, i64>(&count_query), &binds)
            .fetch_one(pool)
            .await?;

        Ok((items, total))
    }
}

fn build_user_filter(filter: &UserFilter) -> (String, Vec<BindValue>, u32) {
    let mut c = Conditions::new();
    c.text_match("u.name", filter.name.as_deref());
    c.text_match("u.email", filter.email.as_deref());
    c.eq_text("u.role", filter.role.as_deref());
    c.state(filter.state);
    c.finish()
}
