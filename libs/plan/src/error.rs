//! Plan and coordination errors.

use keel_id::StepId;
use thiserror::Error;

use crate::Status;

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while reading or mutating a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// No step with this id exists in the plan.
    #[error("step {step} not found in plan '{plan}'")]
    StepNotFound { plan: String, step: StepId },

    /// The requested transition is not allowed from the step's current status.
    #[error("step '{step}' cannot move from {from} to {to}")]
    InvalidTransition {
        step: String,
        from: Status,
        to: Status,
    },

    /// The plan's lock was poisoned by a panic in another thread.
    #[error("plan '{0}' is unavailable: lock poisoned")]
    Poisoned(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors raised when building a coordinator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    /// A coordinator needs at least one plan to drive.
    #[error("at least one plan manager is required")]
    NoPlanManagers,

    /// Two managers drive plans with the same name.
    #[error("duplicate plan name: {0}")]
    DuplicatePlan(String),
}
