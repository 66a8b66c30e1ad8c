//! JWT-based authentication extractor for Axum handlers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap};
use biblioteca_audit::AuditContext;
use biblioteca_core::audit::{Actor, RequestMeta};
use biblioteca_core::error::CoreError;
use biblioteca_core::types::DbId;

use crate::auth::jwt::{validate_token, Claims, JwtConfig};
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from a JWT Bearer token in the `Authorization` header.
///
/// ```ignore
/// async fn my_handler(user: AuthUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = user.user_id, role = %user.role, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// The user's internal database id (from `claims.sub`).
    pub user_id: DbId,
    pub email: String,
    /// The user's role name (`"admin"` or `"user"`).
    pub role: String,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor::user(
            self.user_id,
            Some(self.email.clone()),
            Some(self.role.clone()),
        )
    }

    /// Audit context for actions this user performs.
    pub fn audit_context(&self, meta: RequestMeta) -> AuditContext {
        AuditContext::new(self.actor(), meta)
    }
}

impl From<Claims> for AuthUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            role: claims.role,
        }
    }
}

/// The raw `Authorization` header value, if present and readable.
fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
}

/// Best-effort decode of the Bearer token; `None` for missing or invalid
/// tokens.
pub fn user_from_headers(headers: &HeaderMap, config: &JwtConfig) -> Option<AuthUser> {
    let token = authorization(headers)?.strip_prefix("Bearer ")?;
    validate_token(token, config).ok().map(AuthUser::from)
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let missing = CoreError::Unauthorized("Missing Authorization header".into());
        let auth_header = authorization(&parts.headers).ok_or(missing)?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid Authorization format. Expected: Bearer <token>".into(),
            ))
        })?;

        let claims = validate_token(token, &state.config.jwt).map_err(|_| {
            AppError::Core(CoreError::Unauthorized("Invalid or expired token".into()))
        })?;

        Ok(AuthUser::from(claims))
    }
}
