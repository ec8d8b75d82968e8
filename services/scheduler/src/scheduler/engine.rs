//! The scheduling pass.
//!
//! Each pass:
//! - Asks the coordinator for this pass's candidate steps
//! - Reads the goal overrides of the tasks each candidate would launch
//! - Hands the candidate to the offer evaluator
//! - Records launches (or failures) back on the owning plan
//!
//! Task status updates arrive separately through [`Scheduler::handle_status`].

use std::collections::BTreeMap;
use std::sync::Arc;

use keel_plan::{Candidate, PlanCommand, PlanCoordinator, PlanError, TaskSelection};
use keel_state::{OverrideStatus, StateStore, StoreError, TaskStatus};
use tracing::{debug, info, instrument, warn};

use crate::offers::{LaunchOutcome, LaunchRequest, OfferEvaluator};
use crate::overrides::OverrideTracker;

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors that can occur while scheduling.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("plan '{0}' is not managed by this scheduler")]
    UnknownPlan(String),

    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("state store error: {0}")]
    Store(#[from] StoreError),
}

/// Statistics from a scheduling pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub candidates: usize,
    pub steps_launched: usize,
    pub tasks_launched: usize,
    pub steps_declined: usize,
    pub steps_failed: usize,
}

enum StepOutcome {
    Launched(usize),
    Declined,
    Failed,
}

/// Drives plans forward against the offer evaluator.
pub struct Scheduler {
    coordinator: PlanCoordinator,
    state_store: Arc<dyn StateStore>,
    evaluator: Arc<dyn OfferEvaluator>,
    overrides: OverrideTracker,
}

impl Scheduler {
    pub fn new(
        coordinator: PlanCoordinator,
        state_store: Arc<dyn StateStore>,
        evaluator: Arc<dyn OfferEvaluator>,
    ) -> Self {
        Self {
            overrides: OverrideTracker::new(state_store.clone()),
            coordinator,
            state_store,
            evaluator,
        }
    }

    pub fn coordinator(&self) -> &PlanCoordinator {
        &self.coordinator
    }

    /// Runs one scheduling pass.
    ///
    /// A candidate that cannot be processed is logged and counted as failed;
    /// the rest of the pass continues.
    #[instrument(skip(self), fields(service = %self.coordinator.service()))]
    pub async fn run_pass(&self) -> SchedulerResult<PassStats> {
        let candidates = self.coordinator.candidates();
        let mut stats = PassStats {
            candidates: candidates.len(),
            ..PassStats::default()
        };
        debug!(candidates = stats.candidates, "Starting scheduling pass");

        for candidate in candidates {
            let plan = candidate.plan.clone();
            let step = candidate.step_name.clone();
            match self.process(candidate).await {
                Ok(StepOutcome::Launched(tasks)) => {
                    stats.steps_launched += 1;
                    stats.tasks_launched += tasks;
                }
                Ok(StepOutcome::Declined) => stats.steps_declined += 1,
                Ok(StepOutcome::Failed) => stats.steps_failed += 1,
                Err(e) => {
                    warn!(plan = %plan, step = %step, error = %e, "Failed to process candidate");
                    stats.steps_failed += 1;
                }
            }
        }

        if stats.candidates > 0 {
            info!(
                candidates = stats.candidates,
                steps_launched = stats.steps_launched,
                tasks_launched = stats.tasks_launched,
                steps_declined = stats.steps_declined,
                steps_failed = stats.steps_failed,
                "Scheduling pass complete"
            );
        }
        Ok(stats)
    }

    async fn process(&self, candidate: Candidate) -> SchedulerResult<StepOutcome> {
        let manager = self
            .coordinator
            .manager(&candidate.plan)
            .ok_or_else(|| SchedulerError::UnknownPlan(candidate.plan.clone()))?;
        let step = candidate.step_id;

        manager.apply(PlanCommand::PrepareStep(step))?;
        let request = LaunchRequest {
            overrides: self.overrides_for(&candidate)?,
            candidate,
        };

        match self.evaluator.evaluate(&request).await {
            Ok(LaunchOutcome::Launched(tasks)) => {
                self.state_store.store_tasks(&tasks)?;
                manager.apply(PlanCommand::RecordLaunch {
                    step,
                    tasks: tasks.iter().map(|t| t.task_id.clone()).collect(),
                })?;
                self.overrides.on_launch(&tasks)?;
                info!(
                    plan = %request.candidate.plan,
                    step = %request.candidate.step_name,
                    tasks = tasks.len(),
                    "Launched step"
                );
                Ok(StepOutcome::Launched(tasks.len()))
            }
            Ok(LaunchOutcome::Declined) => {
                debug!(step = %request.candidate.step_name, "No matching offer");
                Ok(StepOutcome::Declined)
            }
            Err(e) => {
                warn!(
                    plan = %request.candidate.plan,
                    step = %request.candidate.step_name,
                    error = %e,
                    "Offer evaluation failed"
                );
                manager.apply(PlanCommand::RecordFailure {
                    step,
                    reason: format!("{e:#}"),
                })?;
                Ok(StepOutcome::Failed)
            }
        }
    }

    /// Current overrides of the recorded tasks a candidate would relaunch.
    fn overrides_for(&self, candidate: &Candidate) -> SchedulerResult<BTreeMap<String, OverrideStatus>> {
        let Some(requirement) = &candidate.requirement else {
            return Ok(BTreeMap::new());
        };
        let pod = requirement.pod_instance_name();
        let prefix = format!("{pod}-");

        let mut overrides = BTreeMap::new();
        for task in self.state_store.fetch_tasks()? {
            if task.pod_instance_name().as_deref() != Some(pod.as_str()) {
                continue;
            }
            let selected = match &requirement.tasks {
                TaskSelection::All => true,
                TaskSelection::Named(names) => task
                    .name
                    .strip_prefix(&prefix)
                    .is_some_and(|short| names.contains(short)),
            };
            if selected {
                let status = self.state_store.fetch_goal_override_status(&task.name)?;
                overrides.insert(task.name, status);
            }
        }
        Ok(overrides)
    }

    /// Records a task status and routes it to every plan. Returns whether
    /// any plan changed.
    ///
    /// A status from an earlier incarnation of a task, one whose id no
    /// longer matches the stored task of that name, is still routed to the
    /// plans but is neither stored nor allowed to advance the override.
    #[instrument(skip(self, status), fields(task_id = %status.task_id, state = ?status.state))]
    pub fn handle_status(&self, status: TaskStatus) -> SchedulerResult<bool> {
        let task_name = status.task_id.task_name();
        let current = match self.state_store.fetch_task(task_name)? {
            Some(task) => task.task_id == status.task_id,
            None => true,
        };

        if current {
            self.state_store.store_status(task_name, &status)?;
        } else {
            debug!(task = %task_name, "Ignoring status from a replaced task incarnation");
        }
        let changed = self.coordinator.update(&status);
        if current {
            self.overrides.on_status(task_name, &status)?;
        }
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use keel_id::TaskId;
    use keel_plan::{
        DefaultPlanManager, Phase, Plan, PlanKind, PlanManager, PodInstanceRequirement, Status,
        Step,
    };
    use keel_state::{GoalStateOverride, MemStateStore, OverrideProgress, TaskInfo, TaskState};

    use super::*;
    use crate::offers::MockOfferEvaluator;

    fn scheduler(evaluator: Arc<dyn OfferEvaluator>) -> (Scheduler, Arc<MemStateStore>) {
        let plan = Plan::new(
            "deploy",
            PlanKind::Deploy,
            vec![Phase::new(
                "test",
                vec![
                    Step::new("test-0", PodInstanceRequirement::pod("test", 0)),
                    Step::new("test-1", PodInstanceRequirement::pod("test", 1)),
                ],
            )],
        );
        let managers: Vec<Arc<dyn PlanManager>> = vec![Arc::new(DefaultPlanManager::new(plan))];
        let coordinator = PlanCoordinator::new("svc", managers).unwrap();
        let store = Arc::new(MemStateStore::new());
        (Scheduler::new(coordinator, store.clone(), evaluator), store)
    }

    fn deploy_status(scheduler: &Scheduler) -> Vec<Status> {
        scheduler
            .coordinator()
            .manager("deploy")
            .unwrap()
            .snapshot()
            .unwrap()
            .steps()
            .map(Step::status)
            .collect()
    }

    #[tokio::test]
    async fn test_serial_deploy_runs_to_completion() {
        let (scheduler, store) = scheduler(Arc::new(MockOfferEvaluator::new("svc", ["a"])));

        let stats = scheduler.run_pass().await.unwrap();
        assert_eq!(stats.steps_launched, 1);
        assert_eq!(stats.tasks_launched, 1);
        assert_eq!(deploy_status(&scheduler), vec![Status::Starting, Status::Pending]);

        // Nothing new while test-0 is starting.
        assert_eq!(scheduler.run_pass().await.unwrap().candidates, 0);

        let task = store.fetch_task("test-0-a").unwrap().unwrap();
        assert!(scheduler
            .handle_status(TaskStatus::new(task.task_id.clone(), TaskState::Running))
            .unwrap());
        assert_eq!(
            store.fetch_status("test-0-a").unwrap().map(|s| s.state),
            Some(TaskState::Running)
        );

        scheduler.run_pass().await.unwrap();
        let task = store.fetch_task("test-1-a").unwrap().unwrap();
        scheduler
            .handle_status(TaskStatus::new(task.task_id, TaskState::Running))
            .unwrap();
        assert_eq!(deploy_status(&scheduler), vec![Status::Complete, Status::Complete]);
    }

    #[tokio::test]
    async fn test_evaluator_failure_marks_step_error() {
        let (scheduler, _) = scheduler(Arc::new(MockOfferEvaluator::failing("svc")));

        let stats = scheduler.run_pass().await.unwrap();
        assert_eq!(stats.steps_failed, 1);
        assert_eq!(deploy_status(&scheduler)[0], Status::Error);

        // Retried on the next pass.
        assert_eq!(scheduler.run_pass().await.unwrap().candidates, 1);
    }

    #[tokio::test]
    async fn test_launch_advances_pending_override() {
        let (scheduler, store) = scheduler(Arc::new(MockOfferEvaluator::new("svc", ["a"])));
        let old = TaskInfo::new("test-0-a", TaskId::new("svc", "test-0-a")).with_pod("test", 0);
        store.store_tasks(std::slice::from_ref(&old)).unwrap();
        store
            .store_goal_override_status(
                "test-0-a",
                GoalStateOverride::Paused.new_status(OverrideProgress::Pending),
            )
            .unwrap();

        scheduler.run_pass().await.unwrap();
        assert_eq!(
            store.fetch_goal_override_status("test-0-a").unwrap(),
            GoalStateOverride::Paused.new_status(OverrideProgress::InProgress)
        );

        let relaunched = store.fetch_task("test-0-a").unwrap().unwrap();
        assert_ne!(relaunched.task_id, old.task_id);
        scheduler
            .handle_status(TaskStatus::new(relaunched.task_id, TaskState::Running))
            .unwrap();
        assert_eq!(
            store.fetch_goal_override_status("test-0-a").unwrap(),
            GoalStateOverride::Paused.new_status(OverrideProgress::Complete)
        );
    }

    #[tokio::test]
    async fn test_stale_status_does_not_advance_override() {
        let (scheduler, store) = scheduler(Arc::new(MockOfferEvaluator::new("svc", ["a"])));
        let old = TaskInfo::new("test-0-a", TaskId::new("svc", "test-0-a")).with_pod("test", 0);
        store.store_tasks(std::slice::from_ref(&old)).unwrap();
        store
            .store_goal_override_status(
                "test-0-a",
                GoalStateOverride::Paused.new_status(OverrideProgress::Pending),
            )
            .unwrap();

        scheduler.run_pass().await.unwrap();
        let relaunched = store.fetch_task("test-0-a").unwrap().unwrap();
        scheduler
            .handle_status(TaskStatus::new(relaunched.task_id.clone(), TaskState::Staging))
            .unwrap();

        // The old incarnation reports late.
        assert!(!scheduler
            .handle_status(TaskStatus::new(old.task_id.clone(), TaskState::Running))
            .unwrap());
        assert_eq!(
            store.fetch_goal_override_status("test-0-a").unwrap(),
            GoalStateOverride::Paused.new_status(OverrideProgress::InProgress)
        );
        let stored = store.fetch_status("test-0-a").unwrap().unwrap();
        assert_eq!(stored.task_id, relaunched.task_id);
        assert_eq!(stored.state, TaskState::Staging);
        assert_eq!(deploy_status(&scheduler)[0], Status::Starting);

        scheduler
            .handle_status(TaskStatus::new(relaunched.task_id, TaskState::Running))
            .unwrap();
        assert_eq!(
            store.fetch_goal_override_status("test-0-a").unwrap(),
            GoalStateOverride::Paused.new_status(OverrideProgress::Complete)
        );
    }

    #[tokio::test]
    async fn test_overrides_are_read_for_selected_tasks() {
        let (scheduler, store) = scheduler(Arc::new(MockOfferEvaluator::new("svc", ["a"])));
        let tasks: Vec<TaskInfo> = ["test-0-a", "test-0-b", "test-1-a"]
            .iter()
            .map(|name| {
                let index = if name.starts_with("test-0") { 0 } else { 1 };
                TaskInfo::new(*name, TaskId::new("svc", name)).with_pod("test", index)
            })
            .collect();
        store.store_tasks(&tasks).unwrap();

        let candidate = Candidate {
            plan: "deploy".to_string(),
            step_id: keel_id::StepId::new(),
            step_name: "test-0:[b]".to_string(),
            status: Status::Pending,
            requirement: Some(PodInstanceRequirement::tasks("test", 0, ["b"])),
        };
        let overrides = scheduler.overrides_for(&candidate).unwrap();
        assert_eq!(overrides.keys().collect::<Vec<_>>(), vec!["test-0-b"]);
        assert!(overrides["test-0-b"].is_inactive());

        let whole_pod = Candidate {
            requirement: Some(PodInstanceRequirement::pod("test", 0)),
            ..candidate
        };
        assert_eq!(scheduler.overrides_for(&whole_pod).unwrap().len(), 2);
    }

    #[test]
    fn test_unknown_task_status_is_still_recorded() {
        let (scheduler, store) = scheduler(Arc::new(MockOfferEvaluator::new("svc", ["a"])));
        let stray = TaskId::new("svc", "stray");
        assert!(!scheduler
            .handle_status(TaskStatus::new(stray, TaskState::Lost))
            .unwrap());
        assert!(store.fetch_status("stray").unwrap().is_some());
    }
}
