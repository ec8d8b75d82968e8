//! Goal-state overrides.
//!
//! A task's default goal is to keep running. An operator can override that
//! goal (today: pause it), and the override then moves through its own
//! progress states as the scheduler acts on it:
//!
//! ```text
//! (PAUSED, PENDING) -> (PAUSED, IN_PROGRESS) -> (PAUSED, COMPLETE)
//! (NONE,   PENDING) -> (NONE,   IN_PROGRESS) -> (NONE,   COMPLETE) == INACTIVE
//! ```
//!
//! Overrides are overwritten, never deleted: a task with nothing recorded
//! reads back as [`OverrideStatus::INACTIVE`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::TaskState;

/// The goal imposed on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalStateOverride {
    /// No override: the task follows its normal goal.
    None,
    /// The task is relaunched in a paused (idle) state.
    Paused,
}

impl GoalStateOverride {
    pub fn new_status(self, progress: OverrideProgress) -> OverrideStatus {
        OverrideStatus {
            target: self,
            progress,
        }
    }

    /// Status name while the override is still being applied.
    fn transitioning_name(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Paused => Some("PAUSING"),
        }
    }

    /// Status name once the override is fully in effect.
    fn settled_name(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Paused => Some("PAUSED"),
        }
    }
}

/// How far the scheduler has got in applying an override.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideProgress {
    /// Recorded, but the task has not been relaunched under it yet.
    Pending,
    /// Relaunched under the override, waiting for it to come up.
    InProgress,
    /// In effect.
    Complete,
}

/// An override target paired with its progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OverrideStatus {
    pub target: GoalStateOverride,
    pub progress: OverrideProgress,
}

impl OverrideStatus {
    /// No override applied.
    pub const INACTIVE: Self = Self {
        target: GoalStateOverride::None,
        progress: OverrideProgress::Complete,
    };

    pub fn is_inactive(&self) -> bool {
        *self == Self::INACTIVE
    }

    /// Moves to the next progress state. `Complete` stays put.
    #[must_use]
    pub fn advance(self) -> Self {
        let progress = match self.progress {
            OverrideProgress::Pending => OverrideProgress::InProgress,
            OverrideProgress::InProgress | OverrideProgress::Complete => OverrideProgress::Complete,
        };
        self.target.new_status(progress)
    }

    /// Operator-facing status for a task in `raw` state under this override.
    pub fn display_status(&self, raw: TaskState) -> &'static str {
        let overridden = match self.progress {
            OverrideProgress::Pending | OverrideProgress::InProgress => {
                self.target.transitioning_name()
            }
            OverrideProgress::Complete => self.target.settled_name(),
        };
        overridden.unwrap_or_else(|| raw.display_name())
    }
}

impl Default for OverrideStatus {
    fn default() -> Self {
        Self::INACTIVE
    }
}

impl fmt::Display for OverrideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.target, self.progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(GoalStateOverride::Paused.new_status(OverrideProgress::Pending), TaskState::Running, "PAUSING")]
    #[case(GoalStateOverride::Paused.new_status(OverrideProgress::InProgress), TaskState::Running, "PAUSING")]
    #[case(GoalStateOverride::Paused.new_status(OverrideProgress::Complete), TaskState::Running, "PAUSED")]
    #[case(GoalStateOverride::None.new_status(OverrideProgress::InProgress), TaskState::Staging, "STARTING")]
    #[case(OverrideStatus::INACTIVE, TaskState::Finished, "FINISHED")]
    fn test_display_status(
        #[case] status: OverrideStatus,
        #[case] raw: TaskState,
        #[case] expected: &str,
    ) {
        assert_eq!(status.display_status(raw), expected);
    }

    #[test]
    fn test_advance_walks_to_complete() {
        let pending = GoalStateOverride::Paused.new_status(OverrideProgress::Pending);
        let in_progress = pending.advance();
        assert_eq!(in_progress.progress, OverrideProgress::InProgress);
        let complete = in_progress.advance();
        assert_eq!(complete.progress, OverrideProgress::Complete);
        assert_eq!(complete.advance(), complete);
    }

    #[test]
    fn test_resume_settles_to_inactive() {
        let resumed = GoalStateOverride::None
            .new_status(OverrideProgress::Pending)
            .advance()
            .advance();
        assert!(resumed.is_inactive());
    }
}
