//! Genre entity model and DTOs.

use biblioteca_core::lifecycle::LifecycleState;
use biblioteca_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A genre row joined with its status name.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Genre {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub status_id: DbId,
    pub status_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub restored_at: Option<Timestamp>,
}

impl Genre {
    pub fn state(&self) -> Option<LifecycleState> {
        LifecycleState::from_status_name(&self.status_name)
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == Some(LifecycleState::Deleted)
    }
}

/// DTO for creating a genre.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateGenre {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: Option<String>,
}

/// DTO for updating a genre. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateGenre {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 1000, message = "description must be at most 1000 characters"))]
    pub description: Option<String>,
}

/// Parsed search filters for genres.
#[derive(Debug, Clone, Default)]
pub struct GenreFilter {
    pub name: Option<String>,
    pub state: Option<LifecycleState>,
}
