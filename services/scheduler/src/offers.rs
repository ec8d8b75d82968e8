//! Offer-evaluation seam.
//!
//! Matching a step against cluster resource offers happens outside the
//! scheduling core. The engine hands each candidate to an
//! [`OfferEvaluator`] and records whatever it launched.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use keel_id::TaskId;
use keel_plan::{Candidate, TaskSelection};
use keel_state::{OverrideStatus, TaskInfo};
use serde::Serialize;
use tracing::info;

/// A candidate step to place, plus the goal overrides of the tasks it
/// would launch, read fresh for this pass.
#[derive(Debug, Clone, Serialize)]
pub struct LaunchRequest {
    pub candidate: Candidate,
    pub overrides: BTreeMap<String, OverrideStatus>,
}

/// What came of evaluating a request against the current offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// An offer matched and these tasks were launched.
    Launched(Vec<TaskInfo>),
    /// No suitable offer this time. The step is retried on a later pass.
    Declined,
}

/// Offer evaluation interface.
#[async_trait]
pub trait OfferEvaluator: Send + Sync {
    async fn evaluate(&self, request: &LaunchRequest) -> Result<LaunchOutcome>;
}

/// Evaluator that accepts every request without real offers.
///
/// Requests for a whole pod launch every task in `pod_tasks`; requests
/// naming tasks launch just those.
pub struct MockOfferEvaluator {
    service: String,
    pod_tasks: Vec<String>,
    evaluations: AtomicUsize,
    fail: bool,
}

impl MockOfferEvaluator {
    pub fn new<I, S>(service: impl Into<String>, pod_tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            service: service.into(),
            pod_tasks: pod_tasks.into_iter().map(Into::into).collect(),
            evaluations: AtomicUsize::new(0),
            fail: false,
        }
    }

    /// An evaluator that fails every request.
    pub fn failing(service: impl Into<String>) -> Self {
        Self {
            fail: true,
            ..Self::new(service, Vec::<String>::new())
        }
    }

    /// Number of requests evaluated so far.
    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OfferEvaluator for MockOfferEvaluator {
    async fn evaluate(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            anyhow::bail!("Mock evaluator configured to fail");
        }

        let Some(requirement) = &request.candidate.requirement else {
            return Ok(LaunchOutcome::Launched(Vec::new()));
        };
        let tasks: Vec<&str> = match &requirement.tasks {
            TaskSelection::All => self.pod_tasks.iter().map(String::as_str).collect(),
            TaskSelection::Named(names) => names.iter().map(String::as_str).collect(),
        };

        let pod = requirement.pod_instance_name();
        let launched: Vec<TaskInfo> = tasks
            .into_iter()
            .map(|task| {
                let name = format!("{pod}-{task}");
                TaskInfo::new(&name, TaskId::new(&self.service, &name))
                    .with_pod(&requirement.pod_type, requirement.index)
            })
            .collect();

        info!(
            step = %request.candidate.step_name,
            tasks = launched.len(),
            "[MOCK] Launching tasks"
        );
        Ok(LaunchOutcome::Launched(launched))
    }
}

#[cfg(test)]
mod tests {
    use keel_id::StepId;
    use keel_plan::{PodInstanceRequirement, Status};

    use super::*;

    fn request(requirement: Option<PodInstanceRequirement>) -> LaunchRequest {
        LaunchRequest {
            candidate: Candidate {
                plan: "deploy".to_string(),
                step_id: StepId::new(),
                step_name: "test-0".to_string(),
                status: Status::Pending,
                requirement,
            },
            overrides: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_launches_whole_pod() {
        let evaluator = MockOfferEvaluator::new("svc", ["a", "b"]);
        let outcome = evaluator
            .evaluate(&request(Some(PodInstanceRequirement::pod("test", 0))))
            .await
            .unwrap();

        let LaunchOutcome::Launched(tasks) = outcome else {
            panic!("expected launch");
        };
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["test-0-a", "test-0-b"]);
        assert_eq!(tasks[0].pod_instance_name().as_deref(), Some("test-0"));
        assert_eq!(tasks[0].task_id.task_name(), "test-0-a");
        assert_eq!(evaluator.evaluations(), 1);
    }

    #[tokio::test]
    async fn test_mock_launches_named_tasks() {
        let evaluator = MockOfferEvaluator::new("svc", ["a", "b"]);
        let outcome = evaluator
            .evaluate(&request(Some(PodInstanceRequirement::tasks("test", 1, ["b"]))))
            .await
            .unwrap();
        assert!(matches!(outcome, LaunchOutcome::Launched(ref t) if t.len() == 1 && t[0].name == "test-1-b"));
    }

    #[tokio::test]
    async fn test_failing_mock() {
        let evaluator = MockOfferEvaluator::failing("svc");
        assert!(evaluator.evaluate(&request(None)).await.is_err());
    }
}
