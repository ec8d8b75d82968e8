use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use keel_state::{
    ConfigStore, MemConfigStore, MemStateStore, OverrideStatus, ServiceConfig, StateStore,
    StoreResult, TaskInfo, TaskStatus,
};

/// [`MemStateStore`] that records every write.
#[derive(Debug, Default)]
pub struct RecordingStateStore {
    inner: MemStateStore,
    task_writes: AtomicUsize,
    status_writes: AtomicUsize,
    override_writes: Mutex<Vec<(String, OverrideStatus)>>,
}

impl RecordingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override writes, in call order.
    pub fn override_writes(&self) -> Vec<(String, OverrideStatus)> {
        self.override_writes
            .lock()
            .map(|w| w.clone())
            .unwrap_or_default()
    }

    pub fn task_writes(&self) -> usize {
        self.task_writes.load(Ordering::SeqCst)
    }

    /// Every write of any kind.
    pub fn mutations(&self) -> usize {
        self.task_writes()
            + self.status_writes.load(Ordering::SeqCst)
            + self.override_writes().len()
    }

    /// Forgets recorded writes; stored state is kept.
    pub fn reset_counts(&self) {
        self.task_writes.store(0, Ordering::SeqCst);
        self.status_writes.store(0, Ordering::SeqCst);
        if let Ok(mut writes) = self.override_writes.lock() {
            writes.clear();
        }
    }
}

impl StateStore for RecordingStateStore {
    fn fetch_tasks(&self) -> StoreResult<Vec<TaskInfo>> {
        self.inner.fetch_tasks()
    }

    fn fetch_task(&self, task_name: &str) -> StoreResult<Option<TaskInfo>> {
        self.inner.fetch_task(task_name)
    }

    fn store_tasks(&self, tasks: &[TaskInfo]) -> StoreResult<()> {
        self.task_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.store_tasks(tasks)
    }

    fn fetch_statuses(&self) -> StoreResult<Vec<TaskStatus>> {
        self.inner.fetch_statuses()
    }

    fn fetch_status(&self, task_name: &str) -> StoreResult<Option<TaskStatus>> {
        self.inner.fetch_status(task_name)
    }

    fn store_status(&self, task_name: &str, status: &TaskStatus) -> StoreResult<()> {
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        self.inner.store_status(task_name, status)
    }

    fn fetch_goal_override_status(&self, task_name: &str) -> StoreResult<OverrideStatus> {
        self.inner.fetch_goal_override_status(task_name)
    }

    fn store_goal_override_status(
        &self,
        task_name: &str,
        status: OverrideStatus,
    ) -> StoreResult<()> {
        if let Ok(mut writes) = self.override_writes.lock() {
            writes.push((task_name.to_string(), status));
        }
        self.inner.store_goal_override_status(task_name, status)
    }
}

/// [`MemConfigStore`] that counts reads.
#[derive(Debug)]
pub struct CountingConfigStore {
    inner: MemConfigStore,
    reads: AtomicUsize,
}

impl CountingConfigStore {
    pub fn new(service: &str) -> Self {
        Self {
            inner: MemConfigStore::new(service),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ConfigStore for CountingConfigStore {
    fn target_config(&self) -> StoreResult<ServiceConfig> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.target_config()
    }
}
