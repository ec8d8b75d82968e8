use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use keel_scheduler::offers::{LaunchOutcome, LaunchRequest, MockOfferEvaluator, OfferEvaluator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Decline,
    Fail,
}

/// Evaluator that launches like [`MockOfferEvaluator`] unless a step has
/// been scripted to decline or fail. Records every request it sees.
pub struct ScriptedEvaluator {
    launcher: MockOfferEvaluator,
    scripts: Mutex<HashMap<String, Script>>,
    requests: Mutex<Vec<LaunchRequest>>,
}

impl ScriptedEvaluator {
    pub fn new(service: &str, pod_tasks: &[&str]) -> Self {
        Self {
            launcher: MockOfferEvaluator::new(service, pod_tasks.iter().copied()),
            scripts: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// No offer will match `step`.
    pub fn decline(&self, step: &str) {
        self.script(step, Script::Decline);
    }

    /// Evaluating `step` returns an error.
    pub fn fail(&self, step: &str) {
        self.script(step, Script::Fail);
    }

    /// Launch `step` normally again.
    pub fn clear(&self, step: &str) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.remove(step);
        }
    }

    fn script(&self, step: &str, script: Script) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(step.to_string(), script);
        }
    }

    /// Requests seen so far, in order.
    pub fn requests(&self) -> Vec<LaunchRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// `(plan, step)` of every request seen so far.
    pub fn evaluated_steps(&self) -> Vec<(String, String)> {
        self.requests()
            .into_iter()
            .map(|r| (r.candidate.plan, r.candidate.step_name))
            .collect()
    }
}

#[async_trait]
impl OfferEvaluator for ScriptedEvaluator {
    async fn evaluate(&self, request: &LaunchRequest) -> Result<LaunchOutcome> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let script = self
            .scripts
            .lock()
            .ok()
            .and_then(|s| s.get(&request.candidate.step_name).copied());
        match script {
            Some(Script::Decline) => Ok(LaunchOutcome::Declined),
            Some(Script::Fail) => anyhow::bail!("scripted failure for {}", request.candidate.step_name),
            None => self.launcher.evaluate(request).await,
        }
    }
}
