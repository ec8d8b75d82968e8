//! Test support for the keel workspace.
//!
//! Recording stand-ins for the scheduler's collaborators, and fixtures
//! that seed a state store with a known set of pods.

mod collaborators;
mod evaluator;
mod fixtures;
mod stores;

pub use collaborators::{RecordingDriver, RecordingFailureSetter};
pub use evaluator::ScriptedEvaluator;
pub use fixtures::{pod_plan, PodFixture, NO_POD_TASK, SERVICE_NAME};
pub use stores::{CountingConfigStore, RecordingStateStore};
