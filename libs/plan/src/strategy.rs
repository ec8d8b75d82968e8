//! Ordering strategies for a container's children.

use serde::{Deserialize, Serialize};

use crate::Status;

/// Which children of a phase or plan may contribute candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Only the first child that is not complete.
    #[default]
    Serial,
    /// Every child that is not complete.
    Parallel,
}

impl Strategy {
    /// Indices of the children allowed to make progress, in order.
    pub fn active<I>(&self, statuses: I) -> Vec<usize>
    where
        I: IntoIterator<Item = Status>,
    {
        let mut open = statuses
            .into_iter()
            .enumerate()
            .filter(|(_, status)| !status.is_complete())
            .map(|(i, _)| i);
        match self {
            Self::Serial => open.next().into_iter().collect(),
            Self::Parallel => open.collect(),
        }
    }
}
