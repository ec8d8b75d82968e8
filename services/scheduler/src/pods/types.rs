//! Operator-facing views.

use keel_id::TaskId;
use keel_state::{TaskInfo, TaskStatus};
use serde::Serialize;

/// A pod instance and the tasks an operation acted on, in pod order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodTasks {
    pub pod: String,
    pub tasks: Vec<String>,
}

/// Every pod of a service, grouped by pod type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub pods: Vec<PodStatus>,
}

/// All instances of one pod type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PodStatus {
    pub name: String,
    pub instances: Vec<InstanceStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceStatus {
    pub name: String,
    pub tasks: Vec<TaskStatusView>,
}

/// One task's display status.
///
/// `status` is omitted for tasks that have never reported one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatusView {
    pub name: String,
    pub id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// A task with its latest status, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskInfoAndStatus {
    pub info: TaskInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}
