//! Role-based access control (RBAC) extractors.
//!
//! Each extractor wraps [`AuthUser`], re-reads the account behind the token
//! and rejects requests whose account is gone or soft-deleted, or whose
//! stored role does not meet the minimum requirement.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use biblioteca_core::error::CoreError;
use biblioteca_core::roles::ROLE_ADMIN;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Requires the `admin` role. Rejects with 403 Forbidden otherwise.
///
/// ```ignore
/// async fn admin_only(RequireAdmin(user): RequireAdmin) -> AppResult<Json<()>> {
///     Ok(Json(()))
/// }
/// ```
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = active_account(parts, state).await?;
        if user.role != ROLE_ADMIN {
            return Err(CoreError::Forbidden("Admin role required".into()).into());
        }
        Ok(RequireAdmin(user))
    }
}

/// Requires any authenticated user whose account is still active.
pub struct RequireAuth(pub AuthUser);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = active_account(parts, state).await?;
        Ok(RequireAuth(user))
    }
}

/// The token's user, refreshed from the store. Email and role come from the
/// stored account rather than the token claims.
async fn active_account(parts: &mut Parts, state: &AppState) -> Result<AuthUser, AppError> {
    let user = AuthUser::from_request_parts(parts, state).await?;
    let account = match state.users.find_one(user.user_id).await {
        Ok(account) => account,
        Err(AppError::Core(CoreError::NotFound { .. })) => {
            let gone = CoreError::Unauthorized("Account no longer exists".into());
            return Err(gone.into());
        }
        Err(e) => return Err(e),
    };
    if account.is_deleted() {
        tracing::warn!(user_id = account.id, "Rejected token of a deleted account");
        return Err(AppError::Core(CoreError::Forbidden("Account is deleted".into())));
    }
    Ok(AuthUser {
        user_id: account.id,
        email: account.email,
        role: account.role,
    })
}
