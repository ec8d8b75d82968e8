//! Goal-override progress tracking.
//!
//! An override is recorded as `PENDING` by an operator action. It moves to
//! `IN_PROGRESS` when the task is relaunched under it, and to `COMPLETE`
//! once the relaunched task reports `RUNNING`. A cleared pause follows the
//! same path and ends at `NONE/COMPLETE`, which is the inactive state.

use std::sync::Arc;

use keel_state::{OverrideProgress, StateStore, StoreResult, TaskInfo, TaskState, TaskStatus};
use tracing::info;

/// Advances override progress from scheduler events.
#[derive(Clone)]
pub struct OverrideTracker {
    state_store: Arc<dyn StateStore>,
}

impl OverrideTracker {
    pub fn new(state_store: Arc<dyn StateStore>) -> Self {
        Self { state_store }
    }

    /// `tasks` were just launched.
    pub fn on_launch(&self, tasks: &[TaskInfo]) -> StoreResult<()> {
        for task in tasks {
            self.advance_from(&task.name, OverrideProgress::Pending)?;
        }
        Ok(())
    }

    /// `task_name` reported `status`.
    pub fn on_status(&self, task_name: &str, status: &TaskStatus) -> StoreResult<()> {
        if status.state != TaskState::Running {
            return Ok(());
        }
        self.advance_from(task_name, OverrideProgress::InProgress)
    }

    fn advance_from(&self, task_name: &str, expected: OverrideProgress) -> StoreResult<()> {
        let current = self.state_store.fetch_goal_override_status(task_name)?;
        if current.progress != expected {
            return Ok(());
        }
        let next = current.advance();
        info!(task = %task_name, from = %current, to = %next, "Goal override progressed");
        self.state_store.store_goal_override_status(task_name, next)
    }
}

impl std::fmt::Debug for OverrideTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideTracker").finish_non_exhaustive()
    }
}
