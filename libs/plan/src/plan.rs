//! Plans: one rollout or recovery intent.

use keel_id::StepId;
use keel_state::TaskStatus;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Phase, PlanError, PlanResult, PodInstanceRequirement, Status, Step, Strategy};

/// Name given to the plan that performs the initial install, or the update
/// plan once it has been promoted in its place.
pub const DEPLOY_PLAN_NAME: &str = "deploy";

/// The intent a plan carries. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Primary install or upgrade.
    Deploy,
    /// Configuration update rolled over an existing deployment.
    Update,
    /// Relaunch or replacement of failed pod instances.
    Recovery,
    /// Ad-hoc operator-requested replacement.
    Replace,
}

/// An ordered sequence of phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    name: String,
    kind: PlanKind,
    strategy: Strategy,
    phases: Vec<Phase>,
    interrupted: bool,
}

impl Plan {
    pub fn new(name: impl Into<String>, kind: PlanKind, phases: Vec<Phase>) -> Self {
        Self {
            name: name.into(),
            kind,
            strategy: Strategy::default(),
            phases,
            interrupted: false,
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

    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    pub fn is_deploy_plan(&self) -> bool {
        self.kind == PlanKind::Deploy
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn phases(&self) -> &[Phase] {
        &self.phases
    }

    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.phases.iter().flat_map(|p| p.steps().iter())
    }

    fn steps_mut(&mut self) -> impl Iterator<Item = &mut Step> {
        self.phases.iter_mut().flat_map(|p| p.steps_mut().iter_mut())
    }

    pub fn status(&self) -> Status {
        Status::aggregate(self.phases.iter().map(Phase::status))
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    /// Pauses the whole plan. Step statuses are left as they are.
    pub fn interrupt(&mut self) {
        if !self.interrupted {
            info!(plan = %self.name, "Plan interrupted");
            self.interrupted = true;
        }
    }

    /// Resumes an interrupted plan.
    pub fn proceed(&mut self) {
        if self.interrupted {
            info!(plan = %self.name, "Plan resumed");
            self.interrupted = false;
        }
    }

    pub fn step(&self, id: StepId) -> Option<&Step> {
        self.phases.iter().find_map(|p| p.step(id))
    }

    pub(crate) fn step_mut(&mut self, id: StepId) -> PlanResult<&mut Step> {
        let plan = self.name.clone();
        self.phases
            .iter_mut()
            .find_map(|p| p.step_mut(id))
            .ok_or(PlanError::StepNotFound { plan, step: id })
    }

    /// Requirements held by in-flight steps, whether or not the plan is
    /// interrupted.
    pub fn in_flight_requirements(&self) -> Vec<PodInstanceRequirement> {
        self.steps()
            .filter_map(Step::claimed_asset)
            .cloned()
            .collect()
    }

    /// Requirements this plan claims for coordination. Empty while interrupted.
    pub fn dirty_assets(&self) -> Vec<PodInstanceRequirement> {
        if self.interrupted {
            return Vec::new();
        }
        self.in_flight_requirements()
    }

    /// Steps eligible to run now, in plan order.
    ///
    /// A step is skipped when it conflicts with `excluded`, or with a step
    /// picked earlier in the same call.
    pub fn candidates(&self, excluded: &[PodInstanceRequirement]) -> Vec<&Step> {
        if self.interrupted {
            return Vec::new();
        }
        let mut picked = Vec::new();
        self.strategy
            .active(self.phases.iter().map(Phase::status))
            .into_iter()
            .flat_map(|index| self.phases[index].candidates(excluded, &mut picked))
            .collect()
    }

    /// Routes a task status to every step. Returns whether any step changed.
    pub fn update(&mut self, status: &TaskStatus) -> bool {
        let mut changed = false;
        for step in self.steps_mut() {
            changed |= step.update(status);
        }
        changed
    }

    /// Clears the plan's progress: every step back to `PENDING`.
    pub fn restart(&mut self) {
        info!(plan = %self.name, "Plan restarted");
        for step in self.steps_mut() {
            step.restart();
        }
    }

    /// Marks every step complete.
    pub fn force_complete(&mut self) {
        info!(plan = %self.name, "Plan force-completed");
        for step in self.steps_mut() {
            step.force_complete();
        }
    }
}

/// Picks the plans to run for this scheduler start-up.
///
/// Once a deployment has completed, a configured update plan takes the
/// deploy plan's place: both are removed and a deploy-kind plan named
/// [`DEPLOY_PLAN_NAME`] is built from the update plan's phases. Before the
/// first deployment completes, plans are returned as given.
pub fn select_deploy_plan(plans: Vec<Plan>, has_completed_deployment: bool) -> Vec<Plan> {
    if !has_completed_deployment {
        return plans;
    }
    let Some(update_index) = plans.iter().position(|p| p.kind == PlanKind::Update) else {
        return plans;
    };

    let mut plans = plans;
    let update = plans.remove(update_index);
    info!(
        update_plan = %update.name,
        "Deployment already completed; using update plan as deploy plan"
    );
    plans.retain(|p| p.kind != PlanKind::Deploy);
    plans.push(Plan {
        name: DEPLOY_PLAN_NAME.to_string(),
        kind: PlanKind::Deploy,
        strategy: update.strategy,
        phases: update.phases,
        interrupted: update.interrupted,
    });
    plans
}
