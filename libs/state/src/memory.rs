//! In-memory store implementations.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use uuid::Uuid;

use crate::{
    ConfigStore, OverrideStatus, ServiceConfig, StateStore, StoreError, StoreResult, TaskInfo,
    TaskStatus,
};

#[derive(Debug, Default)]
struct Inner {
    tasks: Vec<TaskInfo>,
    statuses: Vec<(String, TaskStatus)>,
    overrides: HashMap<String, OverrideStatus>,
}

/// [`StateStore`] backed by process memory.
#[derive(Debug, Default)]
pub struct MemStateStore {
    inner: RwLock<Inner>,
}

impl MemStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Poisoned("mem state store"))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Poisoned("mem state store"))
    }
}

impl StateStore for MemStateStore {
    fn fetch_tasks(&self) -> StoreResult<Vec<TaskInfo>> {
        Ok(self.read()?.tasks.clone())
    }

    fn fetch_task(&self, task_name: &str) -> StoreResult<Option<TaskInfo>> {
        Ok(self
            .read()?
            .tasks
            .iter()
            .find(|t| t.name == task_name)
            .cloned())
    }

    fn store_tasks(&self, tasks: &[TaskInfo]) -> StoreResult<()> {
        let mut inner = self.write()?;
        for task in tasks {
            match inner.tasks.iter_mut().find(|t| t.name == task.name) {
                Some(existing) => *existing = task.clone(),
                None => inner.tasks.push(task.clone()),
            }
        }
        debug!(count = tasks.len(), "Stored tasks");
        Ok(())
    }

    fn fetch_statuses(&self) -> StoreResult<Vec<TaskStatus>> {
        Ok(self
            .read()?
            .statuses
            .iter()
            .map(|(_, status)| status.clone())
            .collect())
    }

    fn fetch_status(&self, task_name: &str) -> StoreResult<Option<TaskStatus>> {
        Ok(self
            .read()?
            .statuses
            .iter()
            .find(|(name, _)| name == task_name)
            .map(|(_, status)| status.clone()))
    }

    fn store_status(&self, task_name: &str, status: &TaskStatus) -> StoreResult<()> {
        let mut inner = self.write()?;
        match inner.statuses.iter_mut().find(|(name, _)| name == task_name) {
            Some((_, existing)) => *existing = status.clone(),
            None => inner
                .statuses
                .push((task_name.to_string(), status.clone())),
        }
        Ok(())
    }

    fn fetch_goal_override_status(&self, task_name: &str) -> StoreResult<OverrideStatus> {
        Ok(self
            .read()?
            .overrides
            .get(task_name)
            .copied()
            .unwrap_or(OverrideStatus::INACTIVE))
    }

    fn store_goal_override_status(
        &self,
        task_name: &str,
        status: OverrideStatus,
    ) -> StoreResult<()> {
        self.write()?
            .overrides
            .insert(task_name.to_string(), status);
        debug!(task = task_name, %status, "Stored goal override");
        Ok(())
    }
}

/// [`ConfigStore`] holding a single fixed configuration.
#[derive(Debug, Clone)]
pub struct MemConfigStore {
    config: ServiceConfig,
}

impl MemConfigStore {
    /// A store whose target config is `name` with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: ServiceConfig {
                id: Uuid::new_v4(),
                name: name.into(),
            },
        }
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        Self { config }
    }
}

impl ConfigStore for MemConfigStore {
    fn target_config(&self) -> StoreResult<ServiceConfig> {
        Ok(self.config.clone())
    }
}

#[cfg(test)]
mod tests {
    use keel_id::TaskId;

    use super::*;
    use crate::{GoalStateOverride, OverrideProgress, TaskState};

    fn task(name: &str) -> TaskInfo {
        TaskInfo::new(name, TaskId::new("svc", name))
    }

    #[test]
    fn test_store_tasks_keeps_first_insert_order() {
        let store = MemStateStore::new();
        store.store_tasks(&[task("b"), task("a")]).unwrap();

        let replacement = task("b").with_pod("test", 1);
        store.store_tasks(&[replacement.clone()]).unwrap();

        let names: Vec<_> = store
            .fetch_tasks()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(store.fetch_task("b").unwrap(), Some(replacement));
        assert_eq!(store.fetch_task("c").unwrap(), None);
    }

    #[test]
    fn test_statuses_overwrite_by_name() {
        let store = MemStateStore::new();
        let info = task("a");
        store
            .store_status("a", &TaskStatus::new(info.task_id.clone(), TaskState::Staging))
            .unwrap();
        store
            .store_status("a", &TaskStatus::new(info.task_id.clone(), TaskState::Running))
            .unwrap();

        let statuses = store.fetch_statuses().unwrap();
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].state, TaskState::Running);
        assert!(store.fetch_status("missing").unwrap().is_none());
    }

    #[test]
    fn test_missing_override_reads_inactive() {
        let store = MemStateStore::new();
        assert_eq!(
            store.fetch_goal_override_status("anything").unwrap(),
            OverrideStatus::INACTIVE
        );

        let paused = GoalStateOverride::Paused.new_status(OverrideProgress::Pending);
        store.store_goal_override_status("a", paused).unwrap();
        assert_eq!(store.fetch_goal_override_status("a").unwrap(), paused);
    }

    #[test]
    fn test_config_store_is_stable() {
        let store = MemConfigStore::new("svc");
        assert_eq!(
            store.target_config().unwrap(),
            store.target_config().unwrap()
        );
    }
}
