//! keel scheduler
//!
//! The scheduling service around the plan coordinator:
//!
//! - [`scheduler`]: the pass engine that matches candidate steps against
//!   offers, and the periodic worker that drives it
//! - [`pods`]: pod listing, status views, and the operator actions pause,
//!   resume, restart and replace
//! - [`overrides`]: progress tracking for goal-state overrides
//! - [`driver`] and [`failure`]: the cluster-manager and failure-marking
//!   collaborators, injected at construction
//!
//! Process bootstrap is left to the embedding binary: load a
//! [`config::Config`], call [`telemetry::init`], build the plans and
//! collaborators, and spawn a [`scheduler::SchedulerWorker`].

pub mod config;
pub mod driver;
pub mod failure;
pub mod offers;
pub mod overrides;
pub mod pods;
pub mod scheduler;
pub mod telemetry;
