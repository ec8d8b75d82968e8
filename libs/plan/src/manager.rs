//! Plan managers: exclusive owners of one plan each.

use std::fmt;
use std::sync::{Mutex, MutexGuard};

use keel_id::{StepId, TaskId};
use keel_state::TaskStatus;
use serde::Serialize;

use crate::{Plan, PlanError, PlanResult, PodInstanceRequirement, Status, Step};

/// A step handed out for offer evaluation.
///
/// This is a detached snapshot: it names the step, but holds no reference
/// into the plan tree. Outcomes go back through [`PlanManager::apply`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub plan: String,
    pub step_id: StepId,
    pub step_name: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requirement: Option<PodInstanceRequirement>,
}

impl Candidate {
    fn from_step(plan: &str, step: &Step) -> Self {
        Self {
            plan: plan.to_string(),
            step_id: step.id(),
            step_name: step.name().to_string(),
            status: step.status(),
            requirement: step.requirement().cloned(),
        }
    }
}

/// Every mutation a plan accepts.
#[derive(Debug, Clone)]
pub enum PlanCommand {
    /// Pause the whole plan.
    Interrupt,
    /// Resume an interrupted plan.
    Proceed,
    /// Reset every step to `PENDING`.
    Restart,
    /// Mark every step complete.
    ForceComplete,
    /// The step's resource requirement was computed for this offer cycle.
    PrepareStep(StepId),
    /// An offer matched and these tasks were launched for the step.
    RecordLaunch { step: StepId, tasks: Vec<TaskId> },
    /// Offer evaluation failed for the step.
    RecordFailure { step: StepId, reason: String },
    /// Reset one step to `PENDING`.
    RestartStep(StepId),
    /// Mark one step complete.
    ForceCompleteStep(StepId),
    /// A task reported a new status.
    TaskStatus(TaskStatus),
}

/// Owner of exactly one plan.
///
/// The coordinator only reads through this interface; every change goes
/// through [`apply`](Self::apply).
pub trait PlanManager: Send + Sync + fmt::Debug {
    fn plan_name(&self) -> &str;

    /// A copy of the plan as it is now.
    fn snapshot(&self) -> PlanResult<Plan>;

    /// Eligible steps, skipping any that conflict with `excluded`.
    fn candidates(&self, excluded: &[PodInstanceRequirement]) -> PlanResult<Vec<Candidate>>;

    /// Applies a mutation. Returns whether the plan changed.
    fn apply(&self, command: PlanCommand) -> PlanResult<bool>;

    fn is_interrupted(&self) -> PlanResult<bool> {
        Ok(self.snapshot()?.is_interrupted())
    }

    /// Requirements claimed for coordination; empty while interrupted.
    fn dirty_assets(&self) -> PlanResult<Vec<PodInstanceRequirement>> {
        Ok(self.snapshot()?.dirty_assets())
    }

    /// Requirements held by in-flight steps, ignoring interruption.
    fn in_flight_requirements(&self) -> PlanResult<Vec<PodInstanceRequirement>> {
        Ok(self.snapshot()?.in_flight_requirements())
    }
}

/// [`PlanManager`] that keeps its plan behind a mutex.
pub struct DefaultPlanManager {
    name: String,
    plan: Mutex<Plan>,
}

impl DefaultPlanManager {
    pub fn new(plan: Plan) -> Self {
        Self {
            name: plan.name().to_string(),
            plan: Mutex::new(plan),
        }
    }

    fn lock(&self) -> PlanResult<MutexGuard<'_, Plan>> {
        self.plan
            .lock()
            .map_err(|_| PlanError::Poisoned(self.name.clone()))
    }
}

impl fmt::Debug for DefaultPlanManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPlanManager")
            .field("plan", &self.name)
            .finish_non_exhaustive()
    }
}

impl PlanManager for DefaultPlanManager {
    fn plan_name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self) -> PlanResult<Plan> {
        Ok(self.lock()?.clone())
    }

    fn candidates(&self, excluded: &[PodInstanceRequirement]) -> PlanResult<Vec<Candidate>> {
        let plan = self.lock()?;
        Ok(plan
            .candidates(excluded)
            .into_iter()
            .map(|step| Candidate::from_step(&self.name, step))
            .collect())
    }

    fn apply(&self, command: PlanCommand) -> PlanResult<bool> {
        let mut plan = self.lock()?;
        match command {
            PlanCommand::Interrupt => {
                let changed = !plan.is_interrupted();
                plan.interrupt();
                Ok(changed)
            }
            PlanCommand::Proceed => {
                let changed = plan.is_interrupted();
                plan.proceed();
                Ok(changed)
            }
            PlanCommand::Restart => {
                plan.restart();
                Ok(true)
            }
            PlanCommand::ForceComplete => {
                plan.force_complete();
                Ok(true)
            }
            PlanCommand::PrepareStep(step) => {
                let step = plan.step_mut(step)?;
                let changed = step.status() != Status::Prepared;
                step.prepare()?;
                Ok(changed)
            }
            PlanCommand::RecordLaunch { step, tasks } => {
                plan.step_mut(step)?.record_launch(&tasks)?;
                Ok(true)
            }
            PlanCommand::RecordFailure { step, reason } => {
                plan.step_mut(step)?.fail(reason);
                Ok(true)
            }
            PlanCommand::RestartStep(step) => {
                plan.step_mut(step)?.restart();
                Ok(true)
            }
            PlanCommand::ForceCompleteStep(step) => {
                plan.step_mut(step)?.force_complete();
                Ok(true)
            }
            PlanCommand::TaskStatus(status) => Ok(plan.update(&status)),
        }
    }

    fn is_interrupted(&self) -> PlanResult<bool> {
        Ok(self.lock()?.is_interrupted())
    }

    fn dirty_assets(&self) -> PlanResult<Vec<PodInstanceRequirement>> {
        Ok(self.lock()?.dirty_assets())
    }

    fn in_flight_requirements(&self) -> PlanResult<Vec<PodInstanceRequirement>> {
        Ok(self.lock()?.in_flight_requirements())
    }
}
