//! Phases: ordered groups of steps.

use keel_id::StepId;
use serde::{Deserialize, Serialize};

use crate::{PodInstanceRequirement, Status, Step, Strategy};

/// An ordered group of steps, e.g. one per pod type.
///
/// A phase has no state of its own beyond its steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phase {
    name: String,
    strategy: Strategy,
    steps: Vec<Step>,
}

impl Phase {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            strategy: Strategy::default(),
            steps,
        }
    }

    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub(crate) fn steps_mut(&mut self) -> &mut [Step] {
        &mut self.steps
    }

    pub fn status(&self) -> Status {
        Status::aggregate(self.steps.iter().map(Step::status))
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.steps.iter().find(|s| s.id() == id)
    }

    pub(crate) fn step_mut(&mut self, id: StepId) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id() == id)
    }

    /// Eligible steps the strategy allows, skipping any that conflict with
    /// `excluded` or with a step already picked.
    pub(crate) fn candidates<'a>(
        &'a self,
        excluded: &[PodInstanceRequirement],
        picked: &mut Vec<PodInstanceRequirement>,
    ) -> Vec<&'a Step> {
        let mut out = Vec::new();
        for index in self.strategy.active(self.steps.iter().map(Step::status)) {
            let step = &self.steps[index];
            if !step.is_eligible() || step.is_excluded_by(excluded) || step.is_excluded_by(picked.as_slice()) {
                continue;
            }
            if let Some(requirement) = step.requirement() {
                picked.push(requirement.clone());
            }
            out.push(step);
        }
        out
    }
}
