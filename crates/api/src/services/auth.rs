//! Registration, login, and token issuance.

use biblioteca_audit::{AuditContext, AuditRecorder, Outcome};
use biblioteca_core::audit::{Actor, AuditDetails};
use biblioteca_core::error::CoreError;
use biblioteca_core::types::DbId;
use biblioteca_db::models::user::{User, UserResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::log_audit_failure;
use super::users::{CreateUserRequest, UserService};
use crate::auth::jwt::{generate_access_token, JwtConfig};
use crate::auth::password::verify_password;
use crate::error::AppError;

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Request body for `POST /auth/login`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for `POST /auth/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Successful authentication response returned by login and register.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Clone)]
pub struct AuthService {
    users: UserService,
    recorder: AuditRecorder,
    jwt: JwtConfig,
}

impl AuthService {
    pub fn new(users: UserService, recorder: AuditRecorder, jwt: JwtConfig) -> Self {
        Self {
            users,
            recorder,
            jwt,
        }
    }

    pub async fn register(
        &self,
        ctx: &AuditContext,
        input: RegisterRequest,
    ) -> Result<AuthResponse, AppError> {
        let user = self
            .users
            .register(
                ctx,
                CreateUserRequest {
                    email: input.email,
                    name: input.name,
                    password: input.password,
                    role: None,
                },
            )
            .await?;
        self.issue(&user)
    }

    /// Failed attempts are recorded by the request instrumentation; only
    /// the successful login is recorded here.
    pub async fn login(
        &self,
        ctx: &AuditContext,
        input: LoginRequest,
    ) -> Result<AuthResponse, AppError> {
        let user = self
            .users
            .find_by_email(&input.email)
            .await?
            .ok_or_else(|| CoreError::Unauthorized(INVALID_CREDENTIALS.into()))?;

        let valid = verify_password(&input.password, &user.password_hash)
            .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;
        if !valid {
            return Err(CoreError::Unauthorized(INVALID_CREDENTIALS.into()).into());
        }

        if user.is_deleted() {
            return Err(CoreError::Forbidden("Account is deleted".into()).into());
        }

        let response = self.issue(&user)?;

        let ctx = AuditContext::new(
            Actor::user(user.id, Some(user.email.clone()), Some(user.role.clone())),
            ctx.meta.clone(),
        );
        log_audit_failure(
            self.recorder
                .log_auth(
                    &ctx,
                    "LOGIN_SUCCESS",
                    Outcome::Success,
                    AuditDetails::fields(json!({ "email": user.email })),
                )
                .await,
            "LOGIN_SUCCESS",
        );
        tracing::info!(user_id = user.id, "User logged in");
        Ok(response)
    }

    /// The current user, refusing tokens of accounts deleted since issue.
    pub async fn me(&self, user_id: DbId) -> Result<UserResponse, AppError> {
        let user = self.users.find_one(user_id).await?;
        if user.is_deleted() {
            return Err(CoreError::Forbidden("Account is deleted".into()).into());
        }
        Ok(UserResponse::from(&user))
    }

    fn issue(&self, user: &User) -> Result<AuthResponse, AppError> {
        let access_token = generate_access_token(user.id, &user.email, &user.role, &self.jwt)
            .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))?;
        Ok(AuthResponse {
            access_token,
            expires_in: self.jwt.expires_in_secs(),
            user: UserResponse::from(user),
        })
    }
}
