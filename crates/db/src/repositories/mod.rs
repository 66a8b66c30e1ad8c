//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

mod filter;

pub mod book_repo;
pub mod genre_repo;
pub mod lifecycle_repo;
pub mod status_repo;
pub mod user_repo;

pub use book_repo::BookRepo;
pub use genre_repo::GenreRepo;
pub use lifecycle_repo::LifecycleRepo;
pub use status_repo::StatusRepo;
pub use user_repo::UserRepo;
