use std::sync::Arc;

use keel_id::TaskId;
use keel_plan::{Phase, Plan, PlanKind, PodInstanceRequirement, Step, Strategy};
use keel_scheduler::driver::TaskKiller;
use keel_scheduler::pods::PodQueries;
use keel_state::{
    GoalStateOverride, OverrideProgress, StateStore, StoreResult, TaskInfo, TaskState, TaskStatus,
};

use crate::{CountingConfigStore, RecordingDriver, RecordingFailureSetter, RecordingStateStore};

pub const SERVICE_NAME: &str = "test-service";

/// Name of the fixture task that carries no pod labels.
pub const NO_POD_TASK: &str = "test-task-name";

/// A state store seeded with three `test` pods and one unlabelled task,
/// plus recording collaborators.
///
/// | task             | status   | override             |
/// |------------------|----------|----------------------|
/// | `test-task-name` | RUNNING  | PAUSED/COMPLETE      |
/// | `test-0-a`       | RUNNING  |                      |
/// | `test-0-b`       | STAGING  | NONE/IN_PROGRESS     |
/// | `test-0-c`       | RUNNING  | PAUSED/PENDING       |
/// | `test-0-d`       |          |                      |
/// | `test-1-a`       | FINISHED |                      |
/// | `test-1-b`       | RUNNING  | NONE/IN_PROGRESS     |
/// | `test-2-a`       | FINISHED |                      |
///
/// Recorded writes are reset after seeding.
pub struct PodFixture {
    pub state: Arc<RecordingStateStore>,
    pub config: Arc<CountingConfigStore>,
    pub driver: Arc<RecordingDriver>,
    pub failure_setter: Arc<RecordingFailureSetter>,
    pub tasks: Vec<TaskInfo>,
}

impl PodFixture {
    pub fn new() -> StoreResult<Self> {
        let state = Arc::new(RecordingStateStore::new());

        let mut tasks = vec![TaskInfo::new(
            NO_POD_TASK,
            TaskId::new(SERVICE_NAME, NO_POD_TASK),
        )];
        let pods: [(u32, &[&str]); 3] = [(0, &["a", "b", "c", "d"]), (1, &["a", "b"]), (2, &["a"])];
        for (index, names) in pods {
            for name in names {
                let name = format!("test-{index}-{name}");
                tasks.push(
                    TaskInfo::new(&name, TaskId::new(SERVICE_NAME, &name)).with_pod("test", index),
                );
            }
        }
        state.store_tasks(&tasks)?;

        let statuses = [
            (NO_POD_TASK, TaskState::Running),
            ("test-0-a", TaskState::Running),
            ("test-0-b", TaskState::Staging),
            ("test-0-c", TaskState::Running),
            ("test-1-a", TaskState::Finished),
            ("test-1-b", TaskState::Running),
            ("test-2-a", TaskState::Finished),
        ];
        for (name, task_state) in statuses {
            if let Some(task) = tasks.iter().find(|t| t.name == name) {
                state.store_status(name, &TaskStatus::new(task.task_id.clone(), task_state))?;
            }
        }

        let overrides = [
            (NO_POD_TASK, GoalStateOverride::Paused, OverrideProgress::Complete),
            ("test-0-b", GoalStateOverride::None, OverrideProgress::InProgress),
            ("test-0-c", GoalStateOverride::Paused, OverrideProgress::Pending),
            ("test-1-b", GoalStateOverride::None, OverrideProgress::InProgress),
        ];
        for (name, target, progress) in overrides {
            state.store_goal_override_status(name, target.new_status(progress))?;
        }
        state.reset_counts();

        Ok(Self {
            state,
            config: Arc::new(CountingConfigStore::new(SERVICE_NAME)),
            driver: Arc::new(RecordingDriver::new()),
            failure_setter: Arc::new(RecordingFailureSetter::new()),
            tasks,
        })
    }

    /// Queries wired to this fixture's stores and collaborators.
    pub fn queries(&self) -> PodQueries {
        PodQueries::new(
            SERVICE_NAME,
            self.state.clone(),
            self.config.clone(),
            TaskKiller::new(self.driver.clone()),
            self.failure_setter.clone(),
        )
    }

    /// Fixture tasks of one pod instance, in store order.
    pub fn pod_tasks(&self, pod: &str) -> Vec<TaskInfo> {
        self.tasks
            .iter()
            .filter(|t| t.pod_instance_name().as_deref() == Some(pod))
            .cloned()
            .collect()
    }
}

/// A plan with one phase holding a step per `<pod_type>-<index>`.
pub fn pod_plan(
    name: &str,
    kind: PlanKind,
    pod_type: &str,
    indexes: impl IntoIterator<Item = u32>,
    strategy: Strategy,
) -> Plan {
    let steps = indexes
        .into_iter()
        .map(|index| {
            let requirement = PodInstanceRequirement::pod(pod_type, index);
            Step::new(requirement.to_string(), requirement)
        })
        .collect();
    Plan::new(
        name,
        kind,
        vec![Phase::new(pod_type, steps).with_strategy(strategy)],
    )
}
