use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use keel_id::TaskId;
use keel_state::{
    ConfigStore, GoalStateOverride, OverrideProgress, StateStore, TaskInfo, TaskStatus,
};
use tracing::{debug, info, instrument};

use super::{
    InstanceStatus, PodGroups, PodStatus, PodTasks, QueryError, QueryResult, ServiceStatus,
    TaskInfoAndStatus, TaskStatusView, UNKNOWN_POD,
};
use crate::config::Config;
use crate::driver::{RecoveryType, TaskKiller};
use crate::failure::FailureSetter;

/// Pod queries and operator actions over the state store.
///
/// State is read fresh on every call. Operator actions resolve everything
/// they touch before their first write, so a not-found error leaves the
/// store and the cluster untouched.
pub struct PodQueries {
    service: String,
    state_store: Arc<dyn StateStore>,
    config_store: Arc<dyn ConfigStore>,
    killer: TaskKiller,
    failure_setter: Arc<dyn FailureSetter>,
    kill_on_pause: bool,
}

impl PodQueries {
    pub fn new(
        service: impl Into<String>,
        state_store: Arc<dyn StateStore>,
        config_store: Arc<dyn ConfigStore>,
        killer: TaskKiller,
        failure_setter: Arc<dyn FailureSetter>,
    ) -> Self {
        Self {
            service: service.into(),
            state_store,
            config_store,
            killer,
            failure_setter,
            kill_on_pause: true,
        }
    }

    /// Queries for the configured service, honouring its `kill_on_pause`.
    pub fn from_config(
        config: &Config,
        state_store: Arc<dyn StateStore>,
        config_store: Arc<dyn ConfigStore>,
        killer: TaskKiller,
        failure_setter: Arc<dyn FailureSetter>,
    ) -> Self {
        Self::new(
            &config.service_name,
            state_store,
            config_store,
            killer,
            failure_setter,
        )
        .with_kill_on_pause(config.kill_on_pause)
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Whether pause/resume kill the changed tasks so they relaunch under
    /// the new goal.
    #[must_use]
    pub fn with_kill_on_pause(mut self, kill_on_pause: bool) -> Self {
        self.kill_on_pause = kill_on_pause;
        self
    }

    fn groups(&self) -> QueryResult<PodGroups> {
        Ok(PodGroups::new(self.state_store.fetch_tasks()?))
    }

    fn pod_tasks(&self, pod: &str) -> QueryResult<Vec<TaskInfo>> {
        self.groups()?
            .instance(pod)
            .map(<[TaskInfo]>::to_vec)
            .ok_or_else(|| QueryError::PodNotFound(pod.to_string()))
    }

    fn latest_statuses(&self) -> QueryResult<HashMap<TaskId, TaskStatus>> {
        Ok(self
            .state_store
            .fetch_statuses()?
            .into_iter()
            .map(|status| (status.task_id.clone(), status))
            .collect())
    }

    /// Names of every pod instance.
    pub fn list(&self) -> QueryResult<Vec<String>> {
        Ok(self.groups()?.instance_names())
    }

    /// Display status of every task, grouped by pod type and instance.
    #[instrument(skip(self), fields(service = %self.service))]
    pub fn statuses(&self) -> QueryResult<ServiceStatus> {
        let groups = self.groups()?;
        let statuses = self.latest_statuses()?;

        let mut pods = Vec::new();
        for (pod_type, instances) in groups.pod_types() {
            pods.push(PodStatus {
                name: pod_type.to_string(),
                instances: self.instance_statuses(instances, &statuses)?,
            });
        }
        let unknown = groups.unknown_instances();
        if !unknown.is_empty() {
            pods.push(PodStatus {
                name: UNKNOWN_POD.to_string(),
                instances: self.instance_statuses(unknown, &statuses)?,
            });
        }

        Ok(ServiceStatus {
            service: self.service.clone(),
            pods,
        })
    }

    /// Display status of one pod instance's tasks.
    pub fn status(&self, pod: &str) -> QueryResult<InstanceStatus> {
        let tasks = self.pod_tasks(pod)?;
        let statuses = self.latest_statuses()?;
        Ok(InstanceStatus {
            name: pod.to_string(),
            tasks: self.task_views(&tasks, &statuses)?,
        })
    }

    /// Raw task records and latest statuses of one pod instance.
    pub fn info(&self, pod: &str) -> QueryResult<Vec<TaskInfoAndStatus>> {
        let tasks = self.pod_tasks(pod)?;
        let mut statuses = self.latest_statuses()?;
        Ok(tasks
            .into_iter()
            .map(|info| TaskInfoAndStatus {
                status: statuses.remove(&info.task_id),
                info,
            })
            .collect())
    }

    fn instance_statuses(
        &self,
        instances: Vec<(String, &[TaskInfo])>,
        statuses: &HashMap<TaskId, TaskStatus>,
    ) -> QueryResult<Vec<InstanceStatus>> {
        instances
            .into_iter()
            .map(|(name, tasks)| -> QueryResult<InstanceStatus> {
                Ok(InstanceStatus {
                    name,
                    tasks: self.task_views(tasks, statuses)?,
                })
            })
            .collect()
    }

    fn task_views(
        &self,
        tasks: &[TaskInfo],
        statuses: &HashMap<TaskId, TaskStatus>,
    ) -> QueryResult<Vec<TaskStatusView>> {
        tasks
            .iter()
            .map(|task| -> QueryResult<TaskStatusView> {
                // Overrides only matter for tasks that have reported.
                let status = match statuses.get(&task.task_id) {
                    Some(status) => {
                        let goal = self.state_store.fetch_goal_override_status(&task.name)?;
                        Some(goal.display_status(status.state).to_string())
                    }
                    None => None,
                };
                Ok(TaskStatusView {
                    name: task.name.clone(),
                    id: task.task_id.clone(),
                    status,
                })
            })
            .collect()
    }

    /// Pauses a pod instance, or only the named tasks within it.
    ///
    /// Task names may be given with or without the `<pod>-` prefix.
    pub fn pause(&self, pod: &str, tasks: Option<&[String]>) -> QueryResult<PodTasks> {
        self.override_goal(pod, tasks, GoalStateOverride::Paused)
    }

    /// Clears a pause from a pod instance, or only the named tasks within it.
    pub fn resume(&self, pod: &str, tasks: Option<&[String]>) -> QueryResult<PodTasks> {
        self.override_goal(pod, tasks, GoalStateOverride::None)
    }

    #[instrument(skip(self, requested))]
    fn override_goal(
        &self,
        pod: &str,
        requested: Option<&[String]>,
        target: GoalStateOverride,
    ) -> QueryResult<PodTasks> {
        let pod_tasks = self.pod_tasks(pod)?;
        let selected = match requested {
            Some(names) => select_tasks(pod, pod_tasks, names)?,
            None => pod_tasks,
        };

        for task in &selected {
            let current = self.state_store.fetch_goal_override_status(&task.name)?;
            if current.target == target {
                debug!(task = %task.name, current = %current, "Override already set");
                continue;
            }
            let next = target.new_status(OverrideProgress::Pending);
            info!(task = %task.name, from = %current, to = %next, "Setting goal override");
            self.state_store
                .store_goal_override_status(&task.name, next)?;
            if self.kill_on_pause {
                self.killer.kill_task(task, RecoveryType::Transient)?;
            }
        }

        Ok(pod_tasks_result(pod, &selected))
    }

    /// Restarts (`TRANSIENT`) or replaces (`PERMANENT`) every task of a pod
    /// instance.
    ///
    /// Replace first marks all of the pod's tasks permanently failed in a
    /// single call, then kills them.
    #[instrument(skip(self))]
    pub fn restart(&self, pod: &str, recovery: RecoveryType) -> QueryResult<PodTasks> {
        let tasks = self.pod_tasks(pod)?;

        if recovery == RecoveryType::Permanent {
            self.failure_setter
                .set_failure(
                    self.config_store.as_ref(),
                    self.state_store.as_ref(),
                    &tasks,
                )
                .map_err(QueryError::Failure)?;
        }
        for task in &tasks {
            self.killer.kill_task(task, recovery)?;
        }

        info!(pod = %pod, tasks = tasks.len(), recovery = %recovery, "Pod restarted");
        Ok(pod_tasks_result(pod, &tasks))
    }
}

impl fmt::Debug for PodQueries {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PodQueries")
            .field("service", &self.service)
            .field("kill_on_pause", &self.kill_on_pause)
            .finish_non_exhaustive()
    }
}

/// The pod's tasks named in `requested`, in pod order.
///
/// Fails on the first name that matches no task.
fn select_tasks(
    pod: &str,
    pod_tasks: Vec<TaskInfo>,
    requested: &[String],
) -> QueryResult<Vec<TaskInfo>> {
    let prefix = format!("{pod}-");
    let mut wanted = Vec::with_capacity(requested.len());
    for name in requested {
        let full = if pod_tasks.iter().any(|t| &t.name == name) {
            name.clone()
        } else {
            format!("{prefix}{name}")
        };
        if !pod_tasks.iter().any(|t| t.name == full) {
            return Err(QueryError::TaskNotFound {
                pod: pod.to_string(),
                task: name.clone(),
            });
        }
        wanted.push(full);
    }
    Ok(pod_tasks
        .into_iter()
        .filter(|t| wanted.contains(&t.name))
        .collect())
}

fn pod_tasks_result(pod: &str, tasks: &[TaskInfo]) -> PodTasks {
    PodTasks {
        pod: pod.to_string(),
        tasks: tasks.iter().map(|t| t.name.clone()).collect(),
    }
}
