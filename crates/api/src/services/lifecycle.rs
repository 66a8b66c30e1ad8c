//! Status resolution and guarded status transitions.
//!
//! Pure transition rules live in `biblioteca_core::lifecycle`; this service
//! resolves the status ids and performs the conditional write.

use std::sync::Arc;

use biblioteca_core::error::CoreError;
use biblioteca_core::lifecycle::{LifecycleState, Transition, SEED_ACTIVE_ID, SEED_DELETED_ID};
use biblioteca_core::types::DbId;
use biblioteca_db::models::status::{LifecycleTable, StatusChange};
use biblioteca_db::store::Store;
use chrono::Utc;

use crate::error::AppError;

/// Status ids used when the lookup by name misses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusFallback {
    pub active_id: DbId,
    pub deleted_id: DbId,
}

impl StatusFallback {
    pub fn id_for(self, state: LifecycleState) -> DbId {
        match state {
            LifecycleState::Active => self.active_id,
            LifecycleState::Deleted => self.deleted_id,
        }
    }
}

impl Default for StatusFallback {
    fn default() -> Self {
        Self {
            active_id: SEED_ACTIVE_ID,
            deleted_id: SEED_DELETED_ID,
        }
    }
}

/// Both status ids, resolved for one transition.
#[derive(Debug, Clone, Copy)]
struct ResolvedStatuses {
    active: DbId,
    deleted: DbId,
}

impl ResolvedStatuses {
    fn id_for(self, state: LifecycleState) -> DbId {
        match state {
            LifecycleState::Active => self.active,
            LifecycleState::Deleted => self.deleted,
        }
    }

    fn state_of(self, status_id: DbId) -> Option<LifecycleState> {
        if status_id == self.deleted {
            Some(LifecycleState::Deleted)
        } else if status_id == self.active {
            Some(LifecycleState::Active)
        } else {
            None
        }
    }
}

#[derive(Clone)]
pub struct LifecycleService {
    store: Arc<dyn Store>,
    fallback: Option<StatusFallback>,
}

impl LifecycleService {
    pub fn new(store: Arc<dyn Store>, fallback: Option<StatusFallback>) -> Self {
        Self { store, fallback }
    }

    pub async fn resolve_active_id(&self) -> Result<DbId, AppError> {
        self.resolve(LifecycleState::Active).await
    }

    pub async fn resolve_deleted_id(&self) -> Result<DbId, AppError> {
        self.resolve(LifecycleState::Deleted).await
    }

    async fn resolve(&self, state: LifecycleState) -> Result<DbId, AppError> {
        if let Some(status) = self.store.find_status_by_name(state.as_str()).await? {
            return Ok(status.id);
        }
        match self.fallback {
            Some(fallback) => {
                let id = fallback.id_for(state);
                tracing::warn!(
                    status = state.as_str(),
                    fallback_id = id,
                    "Status lookup by name failed, using fallback id"
                );
                Ok(id)
            }
            None => Err(CoreError::Internal(format!(
                "status '{state}' is not configured and no fallback is set"
            ))
            .into()),
        }
    }

    /// Move an active row to deleted.
    pub async fn delete(&self, table: LifecycleTable, id: DbId) -> Result<(), AppError> {
        self.transition(table, id, Transition::delete(Utc::now()))
            .await
    }

    /// Move a deleted row back to active.
    pub async fn restore(&self, table: LifecycleTable, id: DbId) -> Result<(), AppError> {
        self.transition(table, id, Transition::restore(Utc::now()))
            .await
    }

    async fn transition(
        &self,
        table: LifecycleTable,
        id: DbId,
        transition: Transition,
    ) -> Result<(), AppError> {
        let statuses = ResolvedStatuses {
            active: self.resolve_active_id().await?,
            deleted: self.resolve_deleted_id().await?,
        };
        let change = StatusChange {
            expected_status_id: statuses.id_for(transition.expected),
            target_status_id: statuses.id_for(transition.target),
            deleted_at: transition.deleted_at,
            restored_at: transition.restored_at,
        };

        if self.store.apply_transition(table, id, &change).await? {
            tracing::info!(
                entity = table.entity_name(),
                id,
                state = %transition.target,
                "Status changed"
            );
            return Ok(());
        }

        // The guarded write matched nothing: find out why.
        let entity = table.entity_name();
        let row = self
            .store
            .current_state(table, id)
            .await?
            .ok_or(CoreError::NotFound { entity, id })?;
        let current = statuses
            .state_of(row.status_id)
            .or_else(|| row.state())
            .ok_or_else(|| {
                CoreError::Internal(format!(
                    "{entity} with id {id} has unknown status '{}'",
                    row.status_name
                ))
            })?;
        transition.check(entity, id, current)?;

        // Legal from the state we just read, so another request changed the
        // row between the write and the read.
        Err(CoreError::Conflict(format!(
            "{entity} with id {id} was modified concurrently, retry the request"
        ))
        .into())
    }
}
