//! Book entity model and DTOs.

use biblioteca_core::lifecycle::LifecycleState;
use biblioteca_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// A book row joined with its genre and status names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Book {
    pub id: DbId,
    pub title: String,
    pub author: String,
    pub editorial: String,
    pub price: f64,
    pub genre_id: Option<DbId>,
    pub genre_name: Option<String>,
    pub available: bool,
    pub image_url: Option<String>,
    pub status_id: DbId,
    pub status_name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
    pub restored_at: Option<Timestamp>,
}

impl Book {
    pub fn state(&self) -> Option<LifecycleState> {
        LifecycleState::from_status_name(&self.status_name)
    }

    pub fn is_deleted(&self) -> bool {
        self.state() == Some(LifecycleState::Deleted)
    }
}

/// DTO for creating a book.
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 255, message = "author must be 1-255 characters"))]
    pub author: String,
    #[validate(length(min = 1, max = 255, message = "editorial must be 1-255 characters"))]
    pub editorial: String,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,
    pub genre_id: Option<DbId>,
    pub available: Option<bool>,
}

/// DTO for updating a book. All fields are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize, Validate)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 255, message = "title must be 1-255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "author must be 1-255 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 255, message = "editorial must be 1-255 characters"))]
    pub editorial: Option<String>,
    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: Option<f64>,
    pub genre_id: Option<DbId>,
    pub available: Option<bool>,
}

/// Parsed search filters for books.
#[derive(Debug, Clone, Default)]
pub struct BookFilter {
    pub title: Option<String>,
    pub author: Option<String>,
    pub editorial: Option<String>,
    pub genre_id: Option<DbId>,
    pub available: Option<bool>,
    pub state: Option<LifecycleState>,
}
