//! Pod-instance requirements and the conflict predicate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Which tasks of a pod instance an operation targets.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskSelection {
    /// Every task in the pod instance.
    All,
    /// Only the named tasks.
    Named(BTreeSet<String>),
}

impl TaskSelection {
    pub fn named<I, S>(tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Named(tasks.into_iter().map(Into::into).collect())
    }

    /// Whether the two selections share at least one task.
    pub fn intersects(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::All, _) | (_, Self::All) => true,
            (Self::Named(a), Self::Named(b)) => !a.is_disjoint(b),
        }
    }
}

/// A specific pod instance plus the tasks within it that a step acts on.
///
/// Requirements are compared with [`conflicts_with`](Self::conflicts_with),
/// not by equality: `pod-0` and `pod-0:[a]` are different values that
/// still compete for the same task.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodInstanceRequirement {
    pub pod_type: String,
    pub index: u32,
    pub tasks: TaskSelection,
}

impl PodInstanceRequirement {
    /// Targets every task of `<pod_type>-<index>`.
    pub fn pod(pod_type: impl Into<String>, index: u32) -> Self {
        Self {
            pod_type: pod_type.into(),
            index,
            tasks: TaskSelection::All,
        }
    }

    /// Targets only the named tasks of `<pod_type>-<index>`.
    pub fn tasks<I, S>(pod_type: impl Into<String>, index: u32, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pod_type: pod_type.into(),
            index,
            tasks: TaskSelection::named(tasks),
        }
    }

    pub fn pod_instance_name(&self) -> String {
        format!("{}-{}", self.pod_type, self.index)
    }

    pub fn is_same_pod_instance(&self, other: &Self) -> bool {
        self.pod_type == other.pod_type && self.index == other.index
    }

    /// Same pod instance and overlapping tasks.
    pub fn conflicts_with(&self, other: &Self) -> bool {
        self.is_same_pod_instance(other) && self.tasks.intersects(&other.tasks)
    }
}

impl fmt::Display for PodInstanceRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.pod_type, self.index)?;
        if let TaskSelection::Named(tasks) = &self.tasks {
            let joined: Vec<&str> = tasks.iter().map(String::as_str).collect();
            write!(f, ":[{}]", joined.join(","))?;
        }
        Ok(())
    }
}

/// Whether `requirement` conflicts with any of `others`.
pub fn conflicts_with_any<'a, I>(requirement: &PodInstanceRequirement, others: I) -> bool
where
    I: IntoIterator<Item = &'a PodInstanceRequirement>,
{
    others.into_iter().any(|other| requirement.conflicts_with(other))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(PodInstanceRequirement::pod("test", 0), PodInstanceRequirement::pod("test", 0), true)]
    #[case(PodInstanceRequirement::pod("test", 0), PodInstanceRequirement::pod("test", 1), false)]
    #[case(PodInstanceRequirement::pod("test", 0), PodInstanceRequirement::pod("other", 0), false)]
    #[case(PodInstanceRequirement::pod("test", 0), PodInstanceRequirement::tasks("test", 0, ["a"]), true)]
    #[case(PodInstanceRequirement::tasks("test", 0, ["a", "c"]), PodInstanceRequirement::tasks("test", 0, ["c"]), true)]
    #[case(PodInstanceRequirement::tasks("test", 0, ["a"]), PodInstanceRequirement::tasks("test", 0, ["b"]), false)]
    #[case(PodInstanceRequirement::tasks("test", 0, ["a"]), PodInstanceRequirement::tasks("test", 1, ["a"]), false)]
    fn test_conflicts_with(
        #[case] a: PodInstanceRequirement,
        #[case] b: PodInstanceRequirement,
        #[case] expected: bool,
    ) {
        assert_eq!(a.conflicts_with(&b), expected);
        assert_eq!(b.conflicts_with(&a), expected);
    }

    #[test]
    fn test_display() {
        assert_eq!(PodInstanceRequirement::pod("test", 0).to_string(), "test-0");
        assert_eq!(
            PodInstanceRequirement::tasks("test", 0, ["c", "a"]).to_string(),
            "test-0:[a,c]"
        );
    }

    #[test]
    fn test_empty_named_selection_conflicts_with_nothing_named() {
        let none = PodInstanceRequirement::tasks("test", 0, Vec::<String>::new());
        assert!(!none.conflicts_with(&PodInstanceRequirement::tasks("test", 0, ["a"])));
        assert!(none.conflicts_with(&PodInstanceRequirement::pod("test", 0)));
    }

    #[test]
    fn test_conflicts_with_any() {
        let running = [
            PodInstanceRequirement::pod("test", 1),
            PodInstanceRequirement::tasks("test", 0, ["b"]),
        ];
        assert!(conflicts_with_any(
            &PodInstanceRequirement::tasks("test", 0, ["b", "c"]),
            &running
        ));
        assert!(!conflicts_with_any(
            &PodInstanceRequirement::tasks("test", 0, ["a"]),
            &running
        ));
    }
}
