//! Task and goal-override state for the keel scheduler.
//!
//! This crate holds the values the scheduling core reads on every pass:
//! the tasks it has launched, their last reported status, and any
//! operator-imposed goal-state override. Persistence is behind the
//! [`StateStore`] and [`ConfigStore`] traits; the in-memory
//! implementations here back tests and single-process deployments.

mod error;
mod goal;
mod memory;
mod store;
mod task;

pub use error::{StoreError, StoreResult};
pub use goal::{GoalStateOverride, OverrideProgress, OverrideStatus};
pub use memory::{MemConfigStore, MemStateStore};
pub use store::{ConfigStore, ServiceConfig, StateStore};
pub use task::{labels, TaskInfo, TaskLabels, TaskState, TaskStatus};
