//! Execution status shared by steps, phases and plans.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of a step, or the aggregate progress of a phase or plan.
///
/// ```text
/// PENDING -> PREPARED -> STARTING -> RUNNING -> COMPLETE
///    ^          |           |          |
///    +------ ERROR <--------+----------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// Not started.
    Pending,
    /// Resource requirement computed; waiting for a matching offer.
    Prepared,
    /// Offer matched and launch issued.
    Starting,
    /// At least one launched task confirmed; others still outstanding.
    Running,
    /// Done.
    Complete,
    /// Failed. Retryable on a later pass.
    Error,
}

impl Status {
    /// May be handed out as a candidate.
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Pending | Self::Prepared | Self::Error)
    }

    /// Holds its pod instance's assets.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Prepared | Self::Starting | Self::Running)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Rolls child statuses up into a parent status.
    ///
    /// Any `ERROR` wins, then all-`COMPLETE` (including no children), then
    /// all-`PENDING`. Anything else is mid-flight and reads as `RUNNING`.
    pub fn aggregate<I>(children: I) -> Self
    where
        I: IntoIterator<Item = Status>,
    {
        let mut all_complete = true;
        let mut all_pending = true;
        for status in children {
            if status == Self::Error {
                return Self::Error;
            }
            all_complete &= status == Self::Complete;
            all_pending &= status == Self::Pending;
        }
        if all_complete {
            Self::Complete
        } else if all_pending {
            Self::Pending
        } else {
            Self::Running
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Prepared => "PREPARED",
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Error => "ERROR",
        };
        f.write_str(name)
    }
}
