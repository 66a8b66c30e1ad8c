//! User administration. Passwords arrive in plaintext and are hashed here.

use std::sync::Arc;

use biblioteca_audit::{AuditContext, AuditRecorder, Outcome};
use biblioteca_core::audit::{AuditCategory, AuditDetails};
use biblioteca_core::classify::resources;
use biblioteca_core::error::CoreError;
use biblioteca_core::roles::{is_known_role, ROLE_ADMIN, ROLE_USER};
use biblioteca_core::search::{Page, Pagination};
use biblioteca_core::types::DbId;
use biblioteca_db::models::status::LifecycleTable;
use biblioteca_db::models::user::{CreateUser, UpdateUser, User, UserFilter, UserResponse};
use biblioteca_db::store::{Store, UserStore};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::Validate;

use super::lifecycle::LifecycleService;
use super::{log_audit_failure, required_text, validate_input};
use crate::auth::password::{hash_password, validate_password_strength, MIN_PASSWORD_LENGTH};
use crate::config::AdminSeed;
use crate::error::AppError;

/// Request body for `POST /usuarios`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: String,
    pub password: String,
    /// Defaults to `user`.
    pub role: Option<String>,
}

/// Request body for `PUT /usuarios/{id}`.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "email must be a valid address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255, message = "name must be 1-255 characters"))]
    pub name: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    lifecycle: LifecycleService,
    recorder: AuditRecorder,
}

fn snapshot(user: &User) -> Value {
    json!({
        "email": user.email,
        "name": user.name,
        "role": user.role,
    })
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_role(role: &str) -> Result<(), AppError> {
    if is_known_role(role) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "role must be '{ROLE_ADMIN}' or '{ROLE_USER}', got '{role}'"
        ))
        .into())
    }
}

fn hash(password: &str) -> Result<String, AppError> {
    validate_password_strength(password, MIN_PASSWORD_LENGTH)
        .map_err(|msg| AppError::Core(CoreError::Validation(msg)))?;
    hash_password(password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))
}

impl UserService {
    pub fn new(
        store: Arc<dyn Store>,
        lifecycle: LifecycleService,
        recorder: AuditRecorder,
    ) -> Self {
        Self {
            store,
            lifecycle,
            recorder,
        }
    }

    pub async fn find_one(&self, id: DbId) -> Result<User, AppError> {
        UserStore::find_by_id(self.store.as_ref(), id)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "User", id }.into())
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        Ok(self.store.find_by_email(&email, None).await?)
    }

    async fn ensure_unique(&self, email: &str, exclude_id: Option<DbId>) -> Result<(), AppError> {
        let Some(existing) = self.store.find_by_email(email, exclude_id).await? else {
            return Ok(());
        };
        let msg = if existing.is_deleted() {
            format!(
                "A deleted user with email '{email}' already exists (id {}); restore it instead",
                existing.id
            )
        } else {
            format!("A user with email '{email}' already exists")
        };
        Err(CoreError::Conflict(msg).into())
    }

    /// Validate, hash, and insert. Does not record an audit entry; callers
    /// pick the action.
    async fn insert(&self, input: CreateUserRequest) -> Result<User, AppError> {
        validate_input(&input)?;
        let email = normalize_email(&input.email);
        let name = required_text("name", &input.name)?;
        let role = input.role.unwrap_or_else(|| ROLE_USER.to_string());
        check_role(&role)?;
        let password_hash = hash(&input.password)?;
        self.ensure_unique(&email, None).await?;

        let active_id = self.lifecycle.resolve_active_id().await?;
        let user = UserStore::create(
            self.store.as_ref(),
            &CreateUser {
                email,
                name,
                password_hash,
                role,
            },
            active_id,
        )
        .await?;
        tracing::info!(user_id = user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn create(
        &self,
        ctx: &AuditContext,
        input: CreateUserRequest,
    ) -> Result<User, AppError> {
        let user = self.insert(input).await?;
        self.record(
            ctx,
            "USER_CREATED",
            user.id,
            AuditDetails::fields(snapshot(&user)),
        )
            .await;
        Ok(user)
    }

    /// Self-service sign-up; always creates a plain `user`.
    pub async fn register(
        &self,
        ctx: &AuditContext,
        input: CreateUserRequest,
    ) -> Result<User, AppError> {
        let input = CreateUserRequest {
            role: Some(ROLE_USER.to_string()),
            ..input
        };
        let user = self.insert(input).await?;
        self.record(
            ctx,
            "USER_REGISTERED",
            user.id,
            AuditDetails::fields(snapshot(&user)),
        )
            .await;
        Ok(user)
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: DbId,
        input: UpdateUserRequest,
    ) -> Result<User, AppError> {
        validate_input(&input)?;
        let current = self.find_one(id).await?;

        let email = input.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            self.ensure_unique(email, Some(id)).await?;
        }
        let name = input
            .name
            .as_deref()
            .map(|n| required_text("name", n))
            .transpose()?;
        if let Some(role) = &input.role {
            check_role(role)?;
        }
        let password_hash = input.password.as_deref().map(hash).transpose()?;

        let changes = UpdateUser {
            email,
            name,
            password_hash,
            role: input.role,
        };
        let updated = UserStore::update(self.store.as_ref(), id, &changes)
            .await?
            .ok_or(CoreError::NotFound { entity: "User", id })?;

        let mut after = snapshot(&updated);
        if changes.password_hash.is_some() {
            after["password"] = Value::from("changed");
        }
        log_audit_failure(
            self.recorder
                .log_data_change(
                    ctx,
                    AuditCategory::UserManagement,
                    "USER_UPDATED",
                    resources::USERS,
                    Some(id),
                    &snapshot(&current),
                    &after,
                )
                .await,
            "USER_UPDATED",
        );
        Ok(updated)
    }

    /// Soft-delete a user. Admins cannot delete their own account.
    pub async fn remove(&self, ctx: &AuditContext, id: DbId) -> Result<User, AppError> {
        if ctx.actor.user_id == Some(id) {
            return Err(CoreError::Validation("You cannot delete your own account".into()).into());
        }
        self.lifecycle.delete(LifecycleTable::Users, id).await?;
        self.record(ctx, "USER_DELETED", id, AuditDetails::None)
            .await;
        self.find_one(id).await
    }

    pub async fn restore(&self, ctx: &AuditContext, id: DbId) -> Result<User, AppError> {
        self.lifecycle.restore(LifecycleTable::Users, id).await?;
        self.record(ctx, "USER_RESTORED", id, AuditDetails::None)
            .await;
        self.find_one(id).await
    }

    async fn record(&self, ctx: &AuditContext, action: &str, id: DbId, details: AuditDetails) {
        log_audit_failure(
            self.recorder
                .log_user_management(ctx, action, Some(id), Outcome::Success, details)
                .await,
            action,
        );
    }

    pub async fn search(
        &self,
        filter: &UserFilter,
        pagination: Pagination,
    ) -> Result<Page<UserResponse>, AppError> {
        let (users, total) = UserStore::search(self.store.as_ref(), filter, pagination).await?;
        let items = users.iter().map(UserResponse::from).collect();
        Ok(Page::new(items, total, pagination))
    }

    /// Create the configured admin account unless its email is already
    /// taken. Returns `true` if a row was inserted.
    pub async fn ensure_admin(&self, seed: &AdminSeed) -> Result<bool, AppError> {
        if self.find_by_email(&seed.email).await?.is_some() {
            tracing::debug!(email = %seed.email, "Admin account already present");
            return Ok(false);
        }
        let user = self
            .insert(CreateUserRequest {
                email: seed.email.clone(),
                name: seed.name.clone(),
                password: seed.password.clone(),
                role: Some(ROLE_ADMIN.to_string()),
            })
            .await?;
        self.record(
            &AuditContext::system(),
            "USER_CREATED",
            user.id,
            AuditDetails::fields(json!({ "seeded": true, "email": user.email })),
        )
        .await;
        tracing::info!(user_id = user.id, email = %user.email, "Seeded admin account");
        Ok(true)
    }
}
