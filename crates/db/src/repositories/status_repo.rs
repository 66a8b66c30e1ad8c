//! Repository for the `statuses` lookup table.

use sqlx::PgPool;

use crate::models::status::Status;

const COLUMNS: &str = "id, name, created_at, updated_at";

/// Read access to status rows.
pub struct StatusRepo;

impl StatusRepo {
    /// Find a status by its well-known name (`active`, `deleted`).
    pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Status>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM statuses WHERE name = $1");
        sqlx::query_as::<_, Status>(&query)
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn list(pool: &PgPool) -> Result<Vec<Status>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM statuses ORDER BY id");
        sqlx::query_as::<_, Status>(&query).fetch_all(pool).await
    }
}
