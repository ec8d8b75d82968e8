//! Store interfaces consumed by the scheduling core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{OverrideStatus, StoreResult, TaskInfo, TaskStatus};

/// Persistent task state, keyed by task name.
///
/// Implementations must be safe to call from the scheduling driver and from
/// operator request handlers at the same time. Reads return current state;
/// callers never hold a snapshot across scheduling passes.
pub trait StateStore: Send + Sync {
    /// All recorded tasks, in the order they were first stored.
    fn fetch_tasks(&self) -> StoreResult<Vec<TaskInfo>>;

    fn fetch_task(&self, task_name: &str) -> StoreResult<Option<TaskInfo>>;

    /// Inserts or replaces tasks by name. Replaced tasks keep their position.
    fn store_tasks(&self, tasks: &[TaskInfo]) -> StoreResult<()>;

    /// The latest status of every task that has reported one.
    fn fetch_statuses(&self) -> StoreResult<Vec<TaskStatus>>;

    fn fetch_status(&self, task_name: &str) -> StoreResult<Option<TaskStatus>>;

    fn store_status(&self, task_name: &str, status: &TaskStatus) -> StoreResult<()>;

    /// The task's override, or [`OverrideStatus::INACTIVE`] when none was recorded.
    fn fetch_goal_override_status(&self, task_name: &str) -> StoreResult<OverrideStatus>;

    fn store_goal_override_status(&self, task_name: &str, status: OverrideStatus)
        -> StoreResult<()>;
}

/// Identity of the currently active service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub id: Uuid,
    pub name: String,
}

/// Read-only access to the active service configuration.
pub trait ConfigStore: Send + Sync {
    fn target_config(&self) -> StoreResult<ServiceConfig>;
}
