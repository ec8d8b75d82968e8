//! Steps: the smallest unit of schedulable work.

use keel_id::{StepId, TaskId};
use keel_state::{TaskState, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{PlanError, PlanResult, PodInstanceRequirement, Status};

/// A task launched on behalf of a step, and whether it has confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchedTask {
    pub task_id: TaskId,
    pub confirmed: bool,
}

/// One schedulable unit of work.
///
/// Steps are only mutated by the [`PlanManager`](crate::PlanManager) that owns
/// their plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    id: StepId,
    name: String,
    requirement: Option<PodInstanceRequirement>,
    status: Status,
    launched: Vec<LaunchedTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Step {
    /// A pending step bound to `requirement`.
    pub fn new(name: impl Into<String>, requirement: PodInstanceRequirement) -> Self {
        Self::build(name.into(), Some(requirement))
    }

    /// A pending step that claims no pod instance.
    pub fn unbound(name: impl Into<String>) -> Self {
        Self::build(name.into(), None)
    }

    fn build(name: String, requirement: Option<PodInstanceRequirement>) -> Self {
        Self {
            id: StepId::new(),
            name,
            requirement,
            status: Status::Pending,
            launched: Vec::new(),
            error: None,
        }
    }

    /// Starts the step in `status` instead of `PENDING`.
    #[must_use]
    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn id(&self) -> StepId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn requirement(&self) -> Option<&PodInstanceRequirement> {
        self.requirement.as_ref()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn launched(&self) -> &[LaunchedTask] {
        &self.launched
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_eligible(&self) -> bool {
        self.status.is_eligible()
    }

    pub fn is_in_flight(&self) -> bool {
        self.status.is_in_flight()
    }

    /// The requirement this step currently claims, if any.
    pub fn claimed_asset(&self) -> Option<&PodInstanceRequirement> {
        self.requirement.as_ref().filter(|_| self.is_in_flight())
    }

    /// Whether this step's requirement conflicts with any of `excluded`.
    /// Unbound steps never conflict.
    pub fn is_excluded_by(&self, excluded: &[PodInstanceRequirement]) -> bool {
        self.requirement
            .as_ref()
            .is_some_and(|r| crate::conflicts_with_any(r, excluded))
    }

    fn transition(&mut self, to: Status, allowed: &[Status]) -> PlanResult<()> {
        if !allowed.contains(&self.status) {
            return Err(PlanError::InvalidTransition {
                step: self.name.clone(),
                from: self.status,
                to,
            });
        }
        debug!(step = %self.name, from = %self.status, to = %to, "Step transition");
        self.status = to;
        Ok(())
    }

    /// The resource requirement has been computed for an offer cycle.
    pub fn prepare(&mut self) -> PlanResult<()> {
        self.transition(Status::Prepared, &[Status::Pending, Status::Prepared, Status::Error])
    }

    /// An offer matched and `tasks` were launched.
    pub fn record_launch(&mut self, tasks: &[TaskId]) -> PlanResult<()> {
        let to = if tasks.is_empty() {
            Status::Complete
        } else {
            Status::Starting
        };
        self.transition(to, &[Status::Pending, Status::Prepared, Status::Error])?;
        self.error = None;
        self.launched = tasks
            .iter()
            .map(|task_id| LaunchedTask {
                task_id: task_id.clone(),
                confirmed: false,
            })
            .collect();
        Ok(())
    }

    /// Marks the step failed. It becomes eligible again on a later pass.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(step = %self.name, from = %self.status, reason = %reason, "Step failed");
        self.status = Status::Error;
        self.error = Some(reason);
    }

    /// Operator restart: back to `PENDING`, forgetting the last launch.
    pub fn restart(&mut self) {
        debug!(step = %self.name, from = %self.status, "Step restarted");
        self.status = Status::Pending;
        self.launched.clear();
        self.error = None;
    }

    /// Operator override: mark done regardless of task state.
    pub fn force_complete(&mut self) {
        debug!(step = %self.name, from = %self.status, "Step force-completed");
        self.status = Status::Complete;
        self.error = None;
    }

    /// Applies a task status update. Returns whether the step changed.
    ///
    /// Only updates for tasks this step launched are considered, and only
    /// while the step is `STARTING` or `RUNNING`.
    pub fn update(&mut self, status: &TaskStatus) -> bool {
        if !matches!(self.status, Status::Starting | Status::Running) {
            return false;
        }
        let Some(index) = self
            .launched
            .iter()
            .position(|t| t.task_id == status.task_id)
        else {
            return false;
        };

        match status.state {
            TaskState::Running | TaskState::Finished => {
                self.launched[index].confirmed = true;
                let next = if self.launched.iter().all(|t| t.confirmed) {
                    Status::Complete
                } else {
                    Status::Running
                };
                if next == self.status {
                    return false;
                }
                debug!(step = %self.name, from = %self.status, to = %next, "Step progressed");
                self.status = next;
                true
            }
            state if state.is_failure() => {
                let reason = status
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("task {} {}", status.task_id, state.display_name()));
                self.fail(reason);
                true
            }
            _ => false,
        }
    }
}
