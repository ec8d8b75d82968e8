//! Plan/phase/step state machine and multi-plan coordination.
//!
//! A [`Plan`] is an ordered list of [`Phase`]s, each an ordered list of
//! [`Step`]s. Each step targets one pod instance (a
//! [`PodInstanceRequirement`]) and moves through [`Status`] as offers are
//! matched and task statuses arrive.
//!
//! Several plans may be active at once. A [`PlanCoordinator`] asks each
//! plan's [`PlanManager`] for its candidate steps in priority order and
//! guarantees:
//!
//! - No two candidates returned in one pass target conflicting pod
//!   instances.
//! - A pod instance claimed by an in-flight step of one plan is never
//!   offered to another plan.
//! - Interrupted plans contribute no candidates and claim no assets.
//! - A failing plan manager only costs that plan its candidates.

mod coordinator;
mod error;
mod manager;
mod phase;
mod plan;
mod requirement;
mod status;
mod step;
mod strategy;

pub use coordinator::PlanCoordinator;
pub use error::{CoordinatorError, PlanError, PlanResult};
pub use manager::{Candidate, DefaultPlanManager, PlanCommand, PlanManager};
pub use phase::Phase;
pub use plan::{select_deploy_plan, Plan, PlanKind, DEPLOY_PLAN_NAME};
pub use requirement::{conflicts_with_any, PodInstanceRequirement, TaskSelection};
pub use status::Status;
pub use step::{LaunchedTask, Step};
pub use strategy::Strategy;
