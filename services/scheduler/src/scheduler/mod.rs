//! Scheduling engine and its background worker.
//!
//! The engine runs one pass at a time: candidates from the plan
//! coordinator are handed to the offer evaluator, and launches are recorded
//! back on the plans. The worker repeats passes on a fixed interval.

mod engine;
mod worker;

pub use engine::{PassStats, Scheduler, SchedulerError, SchedulerResult};
pub use worker::SchedulerWorker;
