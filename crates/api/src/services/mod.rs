//! Domain services: validation, natural-key checks, lifecycle transitions,
//! and domain audit events for users, books, and genres.
//!
//! Request-level audit entries (one per request, success or failure) come
//! from the audit middleware. Services only record the domain event of a
//! successful mutation.

pub mod auth;
pub mod books;
pub mod genres;
pub mod lifecycle;
pub mod users;

use biblioteca_audit::AuditError;
use biblioteca_core::error::CoreError;
use validator::Validate;

use crate::error::AppError;

/// Run `validator` derive checks, mapping failures to a 400.
pub(crate) fn validate_input<T: Validate>(input: &T) -> Result<(), AppError> {
    input
        .validate()
        .map_err(|e| AppError::Core(CoreError::Validation(e.to_string())))
}

/// Log a failed domain audit write. The mutation has already been committed,
/// so the caller still gets its result.
pub(crate) fn log_audit_failure(result: Result<(), AuditError>, action: &str) {
    if let Err(e) = result {
        tracing::error!(action, error = %e, "Failed to record audit entry");
    }
}

/// Trim a required text field, rejecting blank values.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be blank")).into());
    }
    Ok(trimmed.to_string())
}
