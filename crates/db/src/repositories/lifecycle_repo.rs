//! Status transitions for every lifecycle-bearing table.

use biblioteca_core::types::DbId;
use sqlx::PgPool;

use crate::models::status::{LifecycleRow, LifecycleTable, StatusChange};

/// Reads and conditionally rewrites the status columns of books, genres, and
/// users.
pub struct LifecycleRepo;

impl LifecycleRepo {
    /// Current lifecycle columns of a row, or `None` if it does not exist.
    pub async fn current(
        pool: &PgPool,
        table: LifecycleTable,
        id: DbId,
    ) -> Result<Option<LifecycleRow>, sqlx::Error> {
        let query = format!(
            "SELECT t.status_id, s.name AS status_name, t.deleted_at, t.restored_at \
             FROM {} t JOIN statuses s ON s.id = t.status_id \
             WHERE t.id = $1",
            table.table_name()
        );
        sqlx::query_as::<_, LifecycleRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply `change` only if the row is still in the expected status.
    ///
    /// Returns `true` if the row was updated. `false` means the row is
    /// missing or was in another status; callers re-read to tell which.
    pub async fn apply(
        pool: &PgPool,
        table: LifecycleTable,
        id: DbId,
        change: &StatusChange,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET status_id = $2, deleted_at = $3, restored_at = $4 \
             WHERE id = $1 AND status_id = $5",
            table.table_name()
        );
        let result = sqlx::query(&query)
            .bind(id)
            .bind(change.target_status_id)
            .bind(change.deleted_at)
            .bind(change.restored_at)
            .bind(change.expected_status_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
