//! Scheduler background worker.
//!
//! Runs scheduling passes on a periodic interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::engine::{Scheduler, SchedulerResult};
use crate::config::Config;

/// Worker that runs the scheduling loop.
pub struct SchedulerWorker {
    scheduler: Arc<Scheduler>,
    interval: Duration,
}

impl SchedulerWorker {
    /// Create a new scheduler worker.
    pub fn new(scheduler: Arc<Scheduler>, interval: Duration) -> Self {
        Self {
            scheduler,
            interval,
        }
    }

    /// A worker using the configured pass interval.
    pub fn from_config(scheduler: Arc<Scheduler>, config: &Config) -> Self {
        Self::new(scheduler, config.pass_interval)
    }

    /// Run the worker until shutdown is signaled.
    ///
    /// Passes never overlap: the next tick is only awaited once the
    /// current pass has finished.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Don't immediately tick on startup - wait for first interval
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.run_pass().await {
                        error!(error = %e, "Scheduling pass failed");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }

    async fn run_pass(&self) -> SchedulerResult<()> {
        self.scheduler.run_pass().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use keel_plan::{
        DefaultPlanManager, Phase, Plan, PlanCoordinator, PlanKind, PlanManager,
        PodInstanceRequirement, Step,
    };
    use keel_state::MemStateStore;

    use super::*;
    use crate::offers::MockOfferEvaluator;

    #[tokio::test]
    async fn test_worker_runs_passes_until_shutdown() {
        let plan = Plan::new(
            "deploy",
            PlanKind::Deploy,
            vec![Phase::new(
                "test",
                vec![Step::new("test-0", PodInstanceRequirement::pod("test", 0))],
            )],
        );
        let managers: Vec<Arc<dyn PlanManager>> = vec![Arc::new(DefaultPlanManager::new(plan))];
        let evaluator = Arc::new(MockOfferEvaluator::new("svc", ["a"]));
        let scheduler = Arc::new(Scheduler::new(
            PlanCoordinator::new("svc", managers).unwrap(),
            Arc::new(MemStateStore::new()),
            evaluator.clone(),
        ));
        let worker = SchedulerWorker::new(scheduler, Duration::from_millis(10));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { worker.run(shutdown_rx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        // One launch; later passes see the step in flight.
        assert_eq!(evaluator.evaluations(), 1);
    }
}
