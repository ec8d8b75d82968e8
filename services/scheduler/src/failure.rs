//! Marking tasks as permanently failed.

use keel_state::{ConfigStore, StateStore, StoreResult, TaskInfo};
use tracing::info;

/// Marks pod tasks as permanently failed so recovery replaces them instead
/// of relaunching in place.
///
/// Called once per replace with every task of the pod instance.
pub trait FailureSetter: Send + Sync {
    fn set_failure(
        &self,
        config_store: &dyn ConfigStore,
        state_store: &dyn StateStore,
        tasks: &[TaskInfo],
    ) -> StoreResult<()>;
}

/// Labels each task `permanently_failed` and stamps it with the target
/// configuration, then writes them back in a single call.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermanentFailureMarker;

impl FailureSetter for PermanentFailureMarker {
    fn set_failure(
        &self,
        config_store: &dyn ConfigStore,
        state_store: &dyn StateStore,
        tasks: &[TaskInfo],
    ) -> StoreResult<()> {
        let config = config_store.target_config()?;
        let marked: Vec<TaskInfo> = tasks
            .iter()
            .cloned()
            .map(|mut task| {
                task.mark_permanently_failed();
                task.set_target_config(config.id);
                task
            })
            .collect();

        info!(
            tasks = ?marked.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            config_id = %config.id,
            "Marking tasks permanently failed"
        );
        state_store.store_tasks(&marked)
    }
}

#[cfg(test)]
mod tests {
    use keel_id::TaskId;
    use keel_state::{MemConfigStore, MemStateStore};

    use super::*;

    #[test]
    fn test_marks_every_task() {
        let config = MemConfigStore::new("svc");
        let state = MemStateStore::new();
        let tasks = vec![
            TaskInfo::new("test-1-a", TaskId::new("svc", "test-1-a")).with_pod("test", 1),
            TaskInfo::new("test-1-b", TaskId::new("svc", "test-1-b")).with_pod("test", 1),
        ];
        state.store_tasks(&tasks).unwrap();

        PermanentFailureMarker
            .set_failure(&config, &state, &tasks)
            .unwrap();

        let config_id = config.target_config().unwrap().id;
        for task in state.fetch_tasks().unwrap() {
            assert!(task.labels().is_permanently_failed());
            assert_eq!(task.labels().target_config(), Some(config_id));
            assert_eq!(task.pod_instance_name().as_deref(), Some("test-1"));
        }
    }
}
