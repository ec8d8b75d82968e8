//! Cluster-manager driver seam and task termination.

use std::fmt;
use std::sync::Arc;

use keel_id::TaskId;
use keel_state::TaskInfo;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors reported by the cluster-manager driver.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The driver is not connected to the cluster manager.
    #[error("driver unavailable: {0}")]
    Unavailable(String),

    /// The cluster manager refused the request.
    #[error("kill of {task_id} rejected: {reason}")]
    Rejected { task_id: TaskId, reason: String },
}

/// Connection to the cluster manager.
///
/// Kill requests are fire-and-forget: the outcome arrives later as a task
/// status. Killing an already dead task must succeed.
pub trait Driver: Send + Sync {
    fn kill_task(&self, task_id: &TaskId) -> Result<(), DriverError>;
}

/// How a killed task should come back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryType {
    /// Relaunch in place, as the same logical instance.
    Transient,
    /// Replace with a fresh instance and placement.
    Permanent,
}

impl fmt::Display for RecoveryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => f.write_str("TRANSIENT"),
            Self::Permanent => f.write_str("PERMANENT"),
        }
    }
}

/// Issues kill requests through an injected [`Driver`].
#[derive(Clone)]
pub struct TaskKiller {
    driver: Arc<dyn Driver>,
}

impl TaskKiller {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self { driver }
    }

    /// Kills one task.
    pub fn kill_task(&self, task: &TaskInfo, recovery: RecoveryType) -> Result<(), DriverError> {
        info!(
            task = %task.name,
            task_id = %task.task_id,
            recovery = %recovery,
            "Killing task"
        );
        self.driver.kill_task(&task.task_id)
    }
}

impl fmt::Debug for TaskKiller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskKiller").finish_non_exhaustive()
    }
}
