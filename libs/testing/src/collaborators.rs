use std::sync::Mutex;

use keel_id::TaskId;
use keel_scheduler::driver::{Driver, DriverError};
use keel_scheduler::failure::FailureSetter;
use keel_state::{ConfigStore, StateStore, StoreResult, TaskInfo};

/// Driver that records every kill request.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    kills: Mutex<Vec<TaskId>>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Killed task ids, in call order.
    pub fn kills(&self) -> Vec<TaskId> {
        self.kills.lock().map(|k| k.clone()).unwrap_or_default()
    }
}

impl Driver for RecordingDriver {
    fn kill_task(&self, task_id: &TaskId) -> Result<(), DriverError> {
        self.kills
            .lock()
            .map_err(|_| DriverError::Unavailable("recording driver poisoned".to_string()))?
            .push(task_id.clone());
        Ok(())
    }
}

/// Failure setter that records each call's tasks and writes nothing.
#[derive(Debug, Default)]
pub struct RecordingFailureSetter {
    calls: Mutex<Vec<Vec<TaskInfo>>>,
}

impl RecordingFailureSetter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Vec<TaskInfo>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl FailureSetter for RecordingFailureSetter {
    fn set_failure(
        &self,
        _config_store: &dyn ConfigStore,
        _state_store: &dyn StateStore,
        tasks: &[TaskInfo],
    ) -> StoreResult<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(tasks.to_vec());
        }
        Ok(())
    }
}
