//! Coordination of candidate steps across plans.
//!
//! Several plans (deploy, update, recovery, ...) may want the same pod
//! instance at the same time. On every scheduling pass the coordinator asks
//! each plan for its candidates in a fixed priority order and makes sure no
//! two plans walk away with conflicting pod instances.

use std::collections::BTreeSet;
use std::sync::Arc;

use keel_state::TaskStatus;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    conflicts_with_any, Candidate, CoordinatorError, PlanCommand, PlanManager, PlanResult,
    PodInstanceRequirement,
};

/// Coordinates an ordered set of plan managers.
///
/// Construction order is priority order: earlier managers get first pick of
/// pod instances on every pass.
#[derive(Debug)]
pub struct PlanCoordinator {
    service: String,
    managers: Vec<Arc<dyn PlanManager>>,
}

impl PlanCoordinator {
    /// Builds a coordinator. Fails when `managers` is empty or two managers
    /// share a plan name.
    pub fn new(
        service: impl Into<String>,
        managers: Vec<Arc<dyn PlanManager>>,
    ) -> Result<Self, CoordinatorError> {
        if managers.is_empty() {
            return Err(CoordinatorError::NoPlanManagers);
        }
        let mut names = BTreeSet::new();
        for manager in &managers {
            if !names.insert(manager.plan_name()) {
                return Err(CoordinatorError::DuplicatePlan(
                    manager.plan_name().to_string(),
                ));
            }
        }
        Ok(Self {
            service: service.into(),
            managers,
        })
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Managers in priority order.
    pub fn managers(&self) -> &[Arc<dyn PlanManager>] {
        &self.managers
    }

    pub fn manager(&self, plan: &str) -> Option<&Arc<dyn PlanManager>> {
        self.managers.iter().find(|m| m.plan_name() == plan)
    }

    /// Steps across all plans that may be matched against offers now.
    ///
    /// Ordered by manager priority, then by step order within each plan. No
    /// two returned candidates conflict. A manager that fails contributes
    /// nothing this pass; the others are unaffected.
    #[instrument(skip(self), fields(service = %self.service))]
    pub fn candidates(&self) -> Vec<Candidate> {
        // Claims from every active plan up front, so a plan evaluated early
        // cannot take a pod instance a later plan is already working on.
        let mut dirtied: BTreeSet<PodInstanceRequirement> = BTreeSet::new();
        for manager in self.active_managers() {
            match manager.dirty_assets() {
                Ok(assets) => dirtied.extend(assets),
                Err(e) => warn!(plan = %manager.plan_name(), error = %e, "Failed to read dirty assets"),
            }
        }
        if !dirtied.is_empty() {
            info!(assets = %display_assets(&dirtied), "Initial dirtied assets");
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for manager in &self.managers {
            match self.manager_candidates(manager.as_ref(), &dirtied) {
                Ok(steps) => {
                    for step in steps {
                        let claimed: Vec<&PodInstanceRequirement> = candidates
                            .iter()
                            .filter_map(|c| c.requirement.as_ref())
                            .collect();
                        if let Some(requirement) = &step.requirement {
                            if conflicts_with_any(requirement, claimed) {
                                warn!(
                                    plan = %step.plan,
                                    step = %step.step_name,
                                    requirement = %requirement,
                                    "Dropping candidate that conflicts with one already chosen this pass"
                                );
                                continue;
                            }
                            dirtied.insert(requirement.clone());
                        }
                        candidates.push(step);
                    }
                }
                Err(e) => {
                    error!(plan = %manager.plan_name(), error = %e, "Error with plan manager");
                }
            }
        }

        if !candidates.is_empty() {
            let names: Vec<&str> = candidates.iter().map(|c| c.step_name.as_str()).collect();
            info!(candidates = ?names, "Got total candidates");
        }
        candidates
    }

    /// Routes a task status to every plan. Returns whether any plan changed.
    ///
    /// A failing manager is logged and skipped.
    pub fn update(&self, status: &TaskStatus) -> bool {
        let mut changed = false;
        for manager in &self.managers {
            match manager.apply(PlanCommand::TaskStatus(status.clone())) {
                Ok(c) => changed |= c,
                Err(e) => {
                    error!(plan = %manager.plan_name(), task_id = %status.task_id, error = %e, "Failed to apply task status")
                }
            }
        }
        changed
    }

    fn active_managers(&self) -> impl Iterator<Item = &Arc<dyn PlanManager>> {
        self.managers
            .iter()
            .filter(|m| matches!(m.is_interrupted(), Ok(false)))
    }

    fn manager_candidates(
        &self,
        manager: &dyn PlanManager,
        dirtied: &BTreeSet<PodInstanceRequirement>,
    ) -> PlanResult<Vec<Candidate>> {
        if manager.is_interrupted()? {
            info!(plan = %manager.plan_name(), "Skipping interrupted plan");
            return Ok(Vec::new());
        }

        let excluded = relevant_dirty_assets(manager, dirtied)?;
        if !excluded.is_empty() {
            info!(
                plan = %manager.plan_name(),
                assets = %display_assets(&excluded),
                "Getting candidates with relevant dirtied assets"
            );
        }

        let steps = manager.candidates(&excluded)?;
        if !steps.is_empty() {
            let names: Vec<&str> = steps.iter().map(|c| c.step_name.as_str()).collect();
            info!(plan = %manager.plan_name(), candidates = ?names, "Got candidates");
        }
        Ok(steps)
    }
}

/// The dirtied assets that should block `manager`.
///
/// An asset is relevant unless it collides with one of the manager's own
/// in-flight steps: the plan must be able to keep driving work it already
/// claimed, while anything claimed elsewhere stays off limits.
fn relevant_dirty_assets<'a, I>(
    manager: &dyn PlanManager,
    dirtied: I,
) -> PlanResult<Vec<PodInstanceRequirement>>
where
    I: IntoIterator<Item = &'a PodInstanceRequirement>,
{
    let own = manager.in_flight_requirements()?;
    let relevant: Vec<_> = dirtied
        .into_iter()
        .filter(|asset| !conflicts_with_any(asset, &own))
        .cloned()
        .collect();
    debug!(
        plan = %manager.plan_name(),
        own = own.len(),
        relevant = relevant.len(),
        "Filtered dirty assets"
    );
    Ok(relevant)
}

fn display_assets<'a, I>(assets: I) -> String
where
    I: IntoIterator<Item = &'a PodInstanceRequirement>,
{
    let names: Vec<String> = assets.into_iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(", "))
}
