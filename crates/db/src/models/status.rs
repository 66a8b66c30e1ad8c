//! Status lookup rows and the lifecycle columns shared by books, genres, and
//! users.

use biblioteca_core::lifecycle::LifecycleState;
use biblioteca_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row of the `statuses` lookup table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Status {
    pub id: DbId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Tables whose rows carry a status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleTable {
    Books,
    Genres,
    Users,
}

impl LifecycleTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Books => "books",
            Self::Genres => "genres",
            Self::Users => "users",
        }
    }

    /// Entity name used in error messages.
    pub fn entity_name(self) -> &'static str {
        match self {
            Self::Books => "Book",
            Self::Genres => "Genre",
            Self::Users => "User",
        }
    }
}

/// Current lifecycle columns of a single row.
#[derive(Debug, Clone, FromRow)]
pub struct LifecycleRow {
    pub status_id: DbId,
    pub status_name: String,
    pub deleted_at: Option<Timestamp>,
    pub restored_at: Option<Timestamp>,
}

impl LifecycleRow {
    pub fn state(&self) -> Option<LifecycleState> {
        LifecycleState::from_status_name(&self.status_name)
    }
}

/// A resolved status write. Applied only if the row still has
/// `expected_status_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub expected_status_id: DbId,
    pub target_status_id: DbId,
    pub deleted_at: Option<Timestamp>,
    pub restored_at: Option<Timestamp>,
}
