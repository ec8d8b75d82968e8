//! Launched tasks and their reported status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use keel_id::{AgentId, TaskId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Well-known task label keys.
pub mod labels {
    /// Pod type the task belongs to, e.g. `test`.
    pub const POD_TYPE: &str = "pod_type";
    /// Pod instance index, e.g. `0`.
    pub const POD_INDEX: &str = "pod_index";
    /// Set to `true` when the task must be replaced rather than relaunched in place.
    pub const PERMANENTLY_FAILED: &str = "permanently_failed";
    /// Config the task was launched against.
    pub const TARGET_CONFIG: &str = "target_config";
}

/// Cluster-manager task state as reported in status updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    Staging,
    Starting,
    Running,
    Killing,
    Finished,
    Failed,
    Killed,
    Lost,
    Error,
}

impl TaskState {
    /// Whether the task will not report again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Killed | Self::Lost | Self::Error
        )
    }

    /// Terminal states that mean the task did not finish on its own.
    pub fn is_failure(&self) -> bool {
        self.is_terminal() && !matches!(self, Self::Finished)
    }

    /// Name shown to operators. Staging is reported as `STARTING`.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Staging | Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Killing => "KILLING",
            Self::Finished => "FINISHED",
            Self::Failed => "FAILED",
            Self::Killed => "KILLED",
            Self::Lost => "LOST",
            Self::Error => "ERROR",
        }
    }
}

/// A status update for one task incarnation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatus {
    pub task_id: TaskId,
    pub state: TaskState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    pub fn new(task_id: TaskId, state: TaskState) -> Self {
        Self {
            task_id,
            state,
            message: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A launched task as recorded in the state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub name: String,
    pub task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl TaskInfo {
    /// A task with no labels. Tasks built this way belong to no pod.
    pub fn new(name: impl Into<String>, task_id: TaskId) -> Self {
        Self {
            name: name.into(),
            task_id,
            agent_id: None,
            labels: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_agent(mut self, agent_id: AgentId) -> Self {
        self.agent_id = Some(agent_id);
        self
    }

    /// Tags the task as a member of pod instance `<pod_type>-<index>`.
    #[must_use]
    pub fn with_pod(mut self, pod_type: &str, index: u32) -> Self {
        self.labels
            .insert(labels::POD_TYPE.to_string(), pod_type.to_string());
        self.labels
            .insert(labels::POD_INDEX.to_string(), index.to_string());
        self
    }

    pub fn mark_permanently_failed(&mut self) {
        self.labels
            .insert(labels::PERMANENTLY_FAILED.to_string(), "true".to_string());
    }

    pub fn set_target_config(&mut self, config_id: Uuid) {
        self.labels
            .insert(labels::TARGET_CONFIG.to_string(), config_id.to_string());
    }

    pub fn labels(&self) -> TaskLabels<'_> {
        TaskLabels(&self.labels)
    }

    /// `<pod_type>-<index>`, or `None` when the pod labels are missing or malformed.
    pub fn pod_instance_name(&self) -> Option<String> {
        let labels = self.labels();
        Some(format!("{}-{}", labels.pod_type()?, labels.pod_index()?))
    }
}

/// Read-only view over a task's labels.
#[derive(Debug, Clone, Copy)]
pub struct TaskLabels<'a>(&'a BTreeMap<String, String>);

impl<'a> TaskLabels<'a> {
    pub fn pod_type(&self) -> Option<&'a str> {
        self.0
            .get(labels::POD_TYPE)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
    }

    pub fn pod_index(&self) -> Option<u32> {
        self.0.get(labels::POD_INDEX)?.parse().ok()
    }

    pub fn is_permanently_failed(&self) -> bool {
        self.0
            .get(labels::PERMANENTLY_FAILED)
            .is_some_and(|v| v == "true")
    }

    pub fn target_config(&self) -> Option<Uuid> {
        self.0.get(labels::TARGET_CONFIG)?.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TaskState::Staging, "STARTING")]
    #[case(TaskState::Starting, "STARTING")]
    #[case(TaskState::Running, "RUNNING")]
    #[case(TaskState::Finished, "FINISHED")]
    #[case(TaskState::Lost, "LOST")]
    fn test_display_name(#[case] state: TaskState, #[case] expected: &str) {
        assert_eq!(state.display_name(), expected);
    }

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Finished.is_terminal());
        assert!(!TaskState::Finished.is_failure());
        assert!(TaskState::Killed.is_failure());
        assert!(!TaskState::Running.is_terminal());
        assert!(!TaskState::Killing.is_terminal());
    }

    #[test]
    fn test_pod_instance_name() {
        let task = TaskInfo::new("test-0-a", TaskId::new("svc", "test-0-a")).with_pod("test", 0);
        assert_eq!(task.pod_instance_name().as_deref(), Some("test-0"));

        let bare = TaskInfo::new("test-task-name", TaskId::new("svc", "test-task-name"));
        assert_eq!(bare.pod_instance_name(), None);
    }

    #[test]
    fn test_malformed_index_is_not_a_pod() {
        let mut task = TaskInfo::new("x", TaskId::new("svc", "x")).with_pod("test", 0);
        task.labels
            .insert(labels::POD_INDEX.to_string(), "zero".to_string());
        assert_eq!(task.pod_instance_name(), None);
    }

    #[test]
    fn test_failure_labels() {
        let mut task = TaskInfo::new("x", TaskId::new("svc", "x"));
        assert!(!task.labels().is_permanently_failed());

        let config_id = Uuid::new_v4();
        task.mark_permanently_failed();
        task.set_target_config(config_id);
        assert!(task.labels().is_permanently_failed());
        assert_eq!(task.labels().target_config(), Some(config_id));
    }

    #[test]
    fn test_status_serializes_without_empty_message() {
        let status = TaskStatus::new(TaskId::new("svc", "x"), TaskState::Running);
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "RUNNING");
        assert!(json.get("message").is_none());
    }
}
