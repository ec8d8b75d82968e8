//! Pod-level queries and operator actions.
//!
//! Tasks are grouped into pod instances by their `pod_type` and
//! `pod_index` labels. Tasks without those labels belong to the synthetic
//! [`UNKNOWN_POD`] type, one instance per task.

mod error;
mod queries;
mod types;

use std::collections::BTreeMap;

use keel_state::TaskInfo;

pub use error::{QueryError, QueryResult};
pub use queries::PodQueries;
pub use types::{
    InstanceStatus, PodStatus, PodTasks, ServiceStatus, TaskInfoAndStatus, TaskStatusView,
};

/// Pod type for tasks that carry no pod labels.
pub const UNKNOWN_POD: &str = "UNKNOWN_POD";

/// Tasks grouped by pod instance.
#[derive(Debug, Default)]
pub(crate) struct PodGroups {
    /// Pod type, then index, then tasks in store order.
    labelled: BTreeMap<String, BTreeMap<u32, Vec<TaskInfo>>>,
    /// Unlabelled tasks, in store order.
    unknown: Vec<TaskInfo>,
}

impl PodGroups {
    pub(crate) fn new(tasks: Vec<TaskInfo>) -> Self {
        let mut groups = Self::default();
        for task in tasks {
            let labels = task.labels();
            let key = labels
                .pod_type()
                .map(str::to_string)
                .zip(labels.pod_index());
            match key {
                Some((pod_type, index)) => groups
                    .labelled
                    .entry(pod_type)
                    .or_default()
                    .entry(index)
                    .or_default()
                    .push(task),
                None => groups.unknown.push(task),
            }
        }
        groups
    }

    /// Instance names in the same order as [`pod_types`](Self::pod_types),
    /// then `UNKNOWN_POD_<task>` per unlabelled task.
    pub(crate) fn instance_names(&self) -> Vec<String> {
        self.labelled
            .iter()
            .flat_map(|(pod_type, instances)| {
                instances.keys().map(move |index| format!("{pod_type}-{index}"))
            })
            .chain(self.unknown.iter().map(|t| format!("{UNKNOWN_POD}_{}", t.name)))
            .collect()
    }

    /// Tasks of a labelled pod instance, in store order.
    ///
    /// Only the canonical `<pod_type>-<index>` spelling matches.
    pub(crate) fn instance(&self, name: &str) -> Option<&[TaskInfo]> {
        let (pod_type, index) = name.rsplit_once('-')?;
        let index: u32 = index.parse().ok()?;
        if format!("{pod_type}-{index}") != name {
            return None;
        }
        self.labelled
            .get(pod_type)?
            .get(&index)
            .map(Vec::as_slice)
    }

    /// Pod types sorted by name with their instances sorted by index.
    pub(crate) fn pod_types(&self) -> impl Iterator<Item = (&str, Vec<(String, &[TaskInfo])>)> {
        self.labelled.iter().map(|(pod_type, instances)| {
            let instances = instances
                .iter()
                .map(|(index, tasks)| (format!("{pod_type}-{index}"), tasks.as_slice()))
                .collect();
            (pod_type.as_str(), instances)
        })
    }

    /// Unlabelled tasks as instances `UNKNOWN_POD-<n>`.
    pub(crate) fn unknown_instances(&self) -> Vec<(String, &[TaskInfo])> {
        self.unknown
            .iter()
            .enumerate()
            .map(|(n, task)| (format!("{UNKNOWN_POD}-{n}"), std::slice::from_ref(task)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use keel_id::TaskId;

    use super::*;

    fn task(name: &str, pod: Option<(&str, u32)>) -> TaskInfo {
        let task = TaskInfo::new(name, TaskId::new("svc", name));
        match pod {
            Some((pod_type, index)) => task.with_pod(pod_type, index),
            None => task,
        }
    }

    #[test]
    fn test_instance_names_are_sorted_with_unknown_last() {
        let groups = PodGroups::new(vec![
            task("orphan", None),
            task("web-1-a", Some(("web", 1))),
            task("db-0-a", Some(("db", 0))),
            task("web-0-a", Some(("web", 0))),
            task("web-0-b", Some(("web", 0))),
        ]);
        assert_eq!(
            groups.instance_names(),
            vec!["db-0", "web-0", "web-1", "UNKNOWN_POD_orphan"]
        );
    }

    #[test]
    fn test_instance_names_follow_numeric_index() {
        let groups = PodGroups::new(vec![
            task("test-10-a", Some(("test", 10))),
            task("test-2-a", Some(("test", 2))),
        ]);
        let listed = groups.instance_names();
        let viewed: Vec<String> = groups
            .pod_types()
            .flat_map(|(_, instances)| instances.into_iter().map(|(name, _)| name))
            .collect();
        assert_eq!(listed, vec!["test-2", "test-10"]);
        assert_eq!(listed, viewed);
    }

    #[test]
    fn test_non_canonical_instance_names_do_not_match() {
        let groups = PodGroups::new(vec![task("test-1-a", Some(("test", 1)))]);
        assert!(groups.instance("test-1").is_some());
        assert!(groups.instance("test-01").is_none());
        assert!(groups.instance("test-+1").is_none());
    }

    #[test]
    fn test_instance_lookup() {
        let groups = PodGroups::new(vec![
            task("my-pod-0-a", Some(("my-pod", 0))),
            task("my-pod-0-b", Some(("my-pod", 0))),
        ]);
        let names: Vec<_> = groups
            .instance("my-pod-0")
            .unwrap()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["my-pod-0-a", "my-pod-0-b"]);
        assert!(groups.instance("my-pod-1").is_none());
        assert!(groups.instance("my-pod").is_none());
        assert!(groups.instance("aaa").is_none());
    }

    #[test]
    fn test_unlabelled_tasks_get_their_own_instance() {
        let groups = PodGroups::new(vec![task("x", None), task("y", None)]);
        let names: Vec<_> = groups
            .unknown_instances()
            .into_iter()
            .map(|(name, tasks)| (name, tasks[0].name.clone()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("UNKNOWN_POD-0".to_string(), "x".to_string()),
                ("UNKNOWN_POD-1".to_string(), "y".to_string())
            ]
        );
    }

    #[test]
    fn test_malformed_index_is_unknown() {
        let mut bad = task("bad", None);
        bad.labels.insert(keel_state::labels::POD_TYPE.to_string(), "test".to_string());
        bad.labels.insert(keel_state::labels::POD_INDEX.to_string(), "x".to_string());
        let groups = PodGroups::new(vec![bad]);
        assert_eq!(groups.instance_names(), vec!["UNKNOWN_POD_bad"]);
    }
}
