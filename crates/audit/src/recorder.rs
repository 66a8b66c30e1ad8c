//! Typed entry points that turn domain events into [`AuditLogEntry`] records.
//!
//! Every call builds exactly one entry, mirrors it to `tracing` at the
//! entry's level, and hands it to the sink once. Sink errors are returned to
//! the caller.

use std::fmt::Display;
use std::sync::Arc;

use biblioteca_core::audit::{
    compute_changes, Actor, AuditCategory, AuditDetails, AuditLevel, AuditLogEntry, ChangeDetails,
    PerformanceDetails, RequestMeta, SystemErrorDetails,
};
use biblioteca_core::classify::resources;
use biblioteca_core::types::DbId;
use serde_json::Value;

use crate::error::AuditError;
use crate::sink::LogSink;

/// Action written by [`AuditRecorder::log_performance`].
pub const ACTION_SLOW_OPERATION: &str = "SLOW_OPERATION";
/// Action written by [`AuditRecorder::log_system_error`].
pub const ACTION_SYSTEM_ERROR: &str = "SYSTEM_ERROR";

/// Who acted and from where.
#[derive(Debug, Clone, Default)]
pub struct AuditContext {
    pub actor: Actor,
    pub meta: RequestMeta,
}

impl AuditContext {
    pub fn new(actor: Actor, meta: RequestMeta) -> Self {
        Self { actor, meta }
    }

    /// Context for events raised by the system itself.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn for_actor(actor: Actor) -> Self {
        Self {
            actor,
            meta: RequestMeta::default(),
        }
    }
}

/// Outcome of an audited operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(String),
}

impl Outcome {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    fn apply(self, entry: AuditLogEntry) -> AuditLogEntry {
        match self {
            Self::Success => entry,
            Self::Failure(message) => entry.with_error(message),
        }
    }
}

/// Builds audit entries and appends them to the shared sink.
#[derive(Clone)]
pub struct AuditRecorder {
    sink: Arc<dyn LogSink>,
}

impl AuditRecorder {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Append a fully built entry.
    pub async fn record(&self, entry: AuditLogEntry) -> Result<(), AuditError> {
        mirror_to_tracing(&entry);
        self.sink.append(&entry).await
    }

    fn entry(
        ctx: &AuditContext,
        category: AuditCategory,
        action: &str,
        outcome: Outcome,
        details: AuditDetails,
    ) -> AuditLogEntry {
        let entry = AuditLogEntry::new(category, action, outcome.is_success())
            .with_actor(&ctx.actor)
            .with_request_meta(&ctx.meta)
            .with_details(details);
        outcome.apply(entry)
    }

    #[allow(clippy::too_many_arguments)]
    async fn log_resource(
        &self,
        ctx: &AuditContext,
        category: AuditCategory,
        resource_type: &str,
        action: &str,
        resource_id: Option<DbId>,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        let entry = Self::entry(ctx, category, action, outcome, details)
            .with_resource(resource_type, resource_id);
        self.record(entry).await
    }

    /// Login, registration, and token events.
    pub async fn log_auth(
        &self,
        ctx: &AuditContext,
        action: &str,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        let entry = Self::entry(ctx, AuditCategory::Auth, action, outcome, details);
        self.record(entry).await
    }

    pub async fn log_user_management(
        &self,
        ctx: &AuditContext,
        action: &str,
        user_id: Option<DbId>,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        self.log_resource(
            ctx,
            AuditCategory::UserManagement,
            resources::USERS,
            action,
            user_id,
            outcome,
            details,
        )
            .await
    }

    pub async fn log_book_management(
        &self,
        ctx: &AuditContext,
        action: &str,
        book_id: Option<DbId>,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        self.log_resource(
            ctx,
            AuditCategory::BookManagement,
            resources::BOOKS,
            action,
            book_id,
            outcome,
            details,
        )
            .await
    }

    pub async fn log_genre_management(
        &self,
        ctx: &AuditContext,
        action: &str,
        genre_id: Option<DbId>,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        self.log_resource(
            ctx,
            AuditCategory::GenreManagement,
            resources::GENRES,
            action,
            genre_id,
            outcome,
            details,
        )
            .await
    }

    /// Reads and exports of stored data.
    pub async fn log_data_access(
        &self,
        ctx: &AuditContext,
        action: &str,
        resource_type: &str,
        resource_id: Option<DbId>,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        self.log_resource(
            ctx,
            AuditCategory::DataAccess,
            resource_type,
            action,
            resource_id,
            outcome,
            details,
        )
            .await
    }

    /// Security events are at least `warn`; failed ones are `error`.
    pub async fn log_security(
        &self,
        ctx: &AuditContext,
        action: &str,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        let level = if outcome.is_success() {
            AuditLevel::Warn
        } else {
            AuditLevel::Error
        };
        let entry =
            Self::entry(ctx, AuditCategory::Security, action, outcome, details).with_level(level);
        self.record(entry).await
    }

    pub async fn log_system(
        &self,
        action: &str,
        outcome: Outcome,
        details: AuditDetails,
    ) -> Result<(), AuditError> {
        let entry = Self::entry(
            &AuditContext::system(),
            AuditCategory::System,
            action,
            outcome,
            details,
        );
        self.record(entry).await
    }

    /// A request that took longer than `threshold_ms`.
    pub async fn log_performance(
        &self,
        ctx: &AuditContext,
        operation: &str,
        duration_ms: u64,
        threshold_ms: u64,
        level: AuditLevel,
    ) -> Result<(), AuditError> {
        let details = AuditDetails::Performance(PerformanceDetails {
            operation: operation.to_string(),
            duration_ms,
            threshold_ms,
        });
        let entry = Self::entry(
            ctx,
            AuditCategory::System,
            ACTION_SLOW_OPERATION,
            Outcome::Success,
            details,
        )
            .with_level(level)
            .with_duration(duration_ms);
        self.record(entry).await
    }

    /// Record an update as a `{field: {from, to}}` diff of `old` against
    /// `new`. `changes` is `null` when nothing differs.
    #[allow(clippy::too_many_arguments)]
    pub async fn log_data_change(
        &self,
        ctx: &AuditContext,
        category: AuditCategory,
        action: &str,
        resource_type: &str,
        resource_id: Option<DbId>,
        old: &Value,
        new: &Value,
    ) -> Result<(), AuditError> {
        let details = AuditDetails::Change(ChangeDetails {
            changes: compute_changes(old, new),
        });
        self.log_resource(
            ctx,
            category,
            resource_type,
            action,
            resource_id,
            Outcome::Success,
            details,
        )
            .await
    }

    /// An unexpected failure inside the system itself.
    pub async fn log_system_error(
        &self,
        context: &str,
        error: &(dyn Display + Sync),
    ) -> Result<(), AuditError> {
        let message = error.to_string();
        let details = AuditDetails::SystemError(SystemErrorDetails {
            context: context.to_string(),
            error: message.clone(),
        });
        let entry = Self::entry(
            &AuditContext::system(),
            AuditCategory::System,
            ACTION_SYSTEM_ERROR,
            Outcome::Failure(message),
            details,
        )
        .with_level(AuditLevel::Error);
        self.record(entry).await
    }
}

fn mirror_to_tracing(entry: &AuditLogEntry) {
    let category = entry.category.as_str();
    let action = entry.action.as_str();
    match entry.level {
        AuditLevel::Info => tracing::info!(
            category,
            action,
            success = entry.success,
            user_id = entry.user_id,
            resource_type = entry.resource_type.as_deref(),
            resource_id = entry.resource_id,
            "Audit event"
        ),
        AuditLevel::Warn => tracing::warn!(
            category,
            action,
            success = entry.success,
            user_id = entry.user_id,
            resource_type = entry.resource_type.as_deref(),
            resource_id = entry.resource_id,
            error = entry.error_message.as_deref(),
            "Audit event"
        ),
        AuditLevel::Error => tracing::error!(
            category,
            action,
            success = entry.success,
            user_id = entry.user_id,
            resource_type = entry.resource_type.as_deref(),
            resource_id = entry.resource_id,
            error = entry.error_message.as_deref(),
            "Audit event"
        ),
    }
}
