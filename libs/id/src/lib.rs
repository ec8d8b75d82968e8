//! # keel-id
//!
//! Identifier types shared by the keel scheduling core.
//!
//! - [`StepId`]: ULID-backed, prefixed with `step_`. Generated when a plan is
//!   built and stable for the lifetime of that plan.
//! - [`TaskId`]: the cluster-manager task id, `<service>__<task name>__<ulid>`.
//!   A new id is minted on every launch of the same logical task, so two
//!   incarnations of `test-0-a` never share one.
//! - [`AgentId`]: opaque id of the agent a task was placed on.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
