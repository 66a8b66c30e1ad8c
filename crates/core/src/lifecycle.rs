//! Two-state status lifecycle shared by books, genres, and users.
//!
//! Entities are never physically removed: a delete moves them to
//! [`LifecycleState::Deleted`] and a restore moves them back. The transition
//! rules live here; resolving status ids and performing the guarded write is
//! the persistence layer's job (see `Transition::expected`).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// Name of the `statuses` row for live entities.
pub const STATUS_ACTIVE: &str = "active";
/// Name of the `statuses` row for soft-deleted entities.
pub const STATUS_DELETED: &str = "deleted";

/// Seeded id of the `active` status row.
pub const SEED_ACTIVE_ID: DbId = 1;
/// Seeded id of the `deleted` status row.
pub const SEED_DELETED_ID: DbId = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Deleted,
}

impl LifecycleState {
    /// The `statuses.name` value for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => STATUS_ACTIVE,
            Self::Deleted => STATUS_DELETED,
        }
    }

    /// Map a `statuses.name` value back to a state.
    pub fn from_status_name(name: &str) -> Option<Self> {
        match name {
            STATUS_ACTIVE => Some(Self::Active),
            STATUS_DELETED => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Sort rank used by listings: active rows come before deleted ones.
    pub fn rank(self) -> u8 {
        match self {
            Self::Active => 0,
            Self::Deleted => 1,
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which way a transition moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    Delete,
    Restore,
}

/// A planned status change, independent of storage.
///
/// `expected` is the state the row must currently be in; storage applies the
/// change with a conditional write on it so concurrent callers cannot both
/// succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub expected: LifecycleState,
    pub target: LifecycleState,
    pub deleted_at: Option<Timestamp>,
    pub restored_at: Option<Timestamp>,
}

impl Transition {
    /// Active -> Deleted, stamping `deleted_at` and clearing `restored_at`.
    pub fn delete(now: Timestamp) -> Self {
        Self {
            kind: TransitionKind::Delete,
            expected: LifecycleState::Active,
            target: LifecycleState::Deleted,
            deleted_at: Some(now),
            restored_at: None,
        }
    }

    /// Deleted -> Active, stamping `restored_at` and clearing `deleted_at`.
    pub fn restore(now: Timestamp) -> Self {
        Self {
            kind: TransitionKind::Restore,
            expected: LifecycleState::Deleted,
            target: LifecycleState::Active,
            deleted_at: None,
            restored_at: Some(now),
        }
    }

    /// Check that an entity in `current` may take this transition.
    pub fn check(
        &self,
        entity: &'static str,
        id: DbId,
        current: LifecycleState,
    ) -> Result<(), CoreError> {
        if current == self.expected {
            return Ok(());
        }
        let msg = match self.kind {
            TransitionKind::Delete => format!("{entity} with id {id} is already deleted"),
            TransitionKind::Restore => format!("{entity} with id {id} is not deleted"),
        };
        Err(CoreError::Conflict(msg))
    }
}

/// Status fields carried by every lifecycle-bearing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lifecycle {
    pub state: LifecycleState,
    pub deleted_at: Option<Timestamp>,
    pub restored_at: Option<Timestamp>,
}

impl Lifecycle {
    /// Fresh entities start active with both timestamps empty.
    pub fn new_active() -> Self {
        Self {
            state: LifecycleState::Active,
            deleted_at: None,
            restored_at: None,
        }
    }

    /// Apply `transition` after checking it is legal from the current state.
    pub fn apply(
        &mut self,
        transition: &Transition,
        entity: &'static str,
        id: DbId,
    ) -> Result<(), CoreError> {
        transition.check(entity, id, self.state)?;
        self.state = transition.target;
        self.deleted_at = transition.deleted_at;
        self.restored_at = transition.restored_at;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new_active()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn status_names_round_trip() {
        assert_eq!(
            LifecycleState::from_status_name("active"),
            Some(LifecycleState::Active)
        );
        assert_eq!(
            LifecycleState::from_status_name("deleted"),
            Some(LifecycleState::Deleted)
        );
        assert_eq!(LifecycleState::from_status_name("archived"), None);
        assert_eq!(LifecycleState::Deleted.to_string(), "deleted");
    }

    #[test]
    fn delete_sets_deleted_at_and_clears_restored_at() {
        let now = Utc::now();
        let mut lc = Lifecycle {
            state: LifecycleState::Active,
            deleted_at: None,
            restored_at: Some(now - Duration::days(1)),
        };
        lc.apply(&Transition::delete(now), "Book", 1).unwrap();
        assert_eq!(lc.state, LifecycleState::Deleted);
        assert_eq!(lc.deleted_at, Some(now));
        assert_eq!(lc.restored_at, None);
    }

    #[test]
    fn restore_after_delete_is_active_with_restored_at() {
        let mut lc = Lifecycle::new_active();
        let t0 = Utc::now();
        lc.apply(&Transition::delete(t0), "Book", 1).unwrap();
        let t1 = t0 + Duration::seconds(5);
        lc.apply(&Transition::restore(t1), "Book", 1).unwrap();
        assert_eq!(lc.state, LifecycleState::Active);
        assert_eq!(lc.deleted_at, None);
        assert_eq!(lc.restored_at, Some(t1));
    }

    #[test]
    fn double_delete_conflicts() {
        let mut lc = Lifecycle::new_active();
        lc.apply(&Transition::delete(Utc::now()), "Book", 3)
            .unwrap();
        let err = lc
            .apply(&Transition::delete(Utc::now()), "Book", 3)
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg.contains("already deleted"));
        assert_eq!(lc.state, LifecycleState::Deleted);
    }

    #[test]
    fn restoring_active_entity_conflicts() {
        let mut lc = Lifecycle::new_active();
        let err = lc
            .apply(&Transition::restore(Utc::now()), "Genre", 9)
            .unwrap_err();
        assert_matches!(err, CoreError::Conflict(msg) if msg.contains("not deleted"));
        assert_eq!(lc, Lifecycle::new_active());
    }

    #[test]
    fn exactly_one_timestamp_set_after_any_transition() {
        let mut lc = Lifecycle::new_active();
        for i in 0..6 {
            let now = Utc::now();
            let t = if i % 2 == 0 {
                Transition::delete(now)
            } else {
                Transition::restore(now)
            };
            lc.apply(&t, "User", 1).unwrap();
            assert!(lc.deleted_at.is_some() != lc.restored_at.is_some());
        }
    }

    #[test]
    fn active_ranks_before_deleted() {
        assert!(LifecycleState::Active.rank() < LifecycleState::Deleted.rank());
    }
}
