//! Sequential plan execution

use std::time::{Duration, Instant};

use semver::Version;

use crate::config::InstallConfig;
use crate::error::{MigrationError, Result};
use crate::migrations::progress::{ProgressEvent, ProgressObserver, ProgressStatus};
use crate::migrations::{MigrationPlan, StepContext, StepState};
use crate::services::storage::Storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step ran in this invocation
    Applied,
    /// The step's guard found it already in place
    AlreadyApplied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub index: usize,
    pub name: String,
    pub outcome: StepOutcome,
    pub elapsed: Duration,
}

/// Result of a successful run: one entry per step, in plan order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub version: Version,
    pub steps: Vec<StepReport>,
}

impl RunReport {
    pub fn applied(&self) -> usize {
        self.count(StepOutcome::Applied)
    }

    pub fn skipped(&self) -> usize {
        self.count(StepOutcome::AlreadyApplied)
    }

    fn count(&self, outcome: StepOutcome) -> usize {
        self.steps.iter().filter(|s| s.outcome == outcome).count()
    }
}

/// Guard verdict of one step as reported by [`Runner::inspect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
    pub index: usize,
    pub name: String,
    pub state: StepState,
}

pub struct Runner<'a> {
    db: &'a dyn Storage,
    install: &'a InstallConfig,
    observer: &'a dyn ProgressObserver,
}

impl<'a> Runner<'a> {
    pub fn new(
        db: &'a dyn Storage,
        install: &'a InstallConfig,
        observer: &'a dyn ProgressObserver,
    ) -> Self {
        Self {
            db,
            install,
            observer,
        }
    }

    fn context(&self) -> StepContext<'a> {
        StepContext {
            db: self.db,
            install: self.install,
        }
    }

    /// Run every step of `plan` in order. The first failure stops the run;
    /// steps that already finished are left as they are.
    pub async fn run(&self, plan: &MigrationPlan) -> Result<RunReport> {
        tracing::info!(
            "Running update {} ({} steps)",
            plan.version,
            plan.steps.len()
        );

        let ctx = self.context();
        let mut steps = Vec::with_capacity(plan.steps.len());

        for (position, step) in plan.steps.iter().enumerate() {
            let index = position + 1;
            let name = step.name();
            let started = Instant::now();

            self.observer.notify(&ProgressEvent::new(
                &plan.version,
                index,
                name,
                ProgressStatus::Started,
            ));

            let result = match step.state(&ctx).await {
                Ok(StepState::Applied) => {
                    tracing::info!("Step {} ({}) already applied, skipping", index, name);
                    Ok(StepOutcome::AlreadyApplied)
                }
                Ok(StepState::Pending) => step.apply(&ctx).await.map(|_| StepOutcome::Applied),
                Ok(StepState::Partial(why)) => {
                    Err(MigrationError::UnexpectedIntermediateState(why))
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(outcome) => {
                    self.observer.notify(&ProgressEvent::new(
                        &plan.version,
                        index,
                        name,
                        ProgressStatus::Completed,
                    ));
                    steps.push(StepReport {
                        index,
                        name: name.to_string(),
                        outcome,
                        elapsed: started.elapsed(),
                    });
                }
                Err(e) => {
                    self.observer.notify(
                        &ProgressEvent::new(&plan.version, index, name, ProgressStatus::Failed)
                            .with_error(&e),
                    );
                    return Err(MigrationError::StepFailed {
                        index,
                        step: name.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }

        let report = RunReport {
            version: plan.version.clone(),
            steps,
        };
        tracing::info!(
            "Update {} finished: {} applied, {} already in place",
            report.version,
            report.applied(),
            report.skipped()
        );
        Ok(report)
    }

    /// Evaluate every guard of `plan` without applying anything
    pub async fn inspect(&self, plan: &MigrationPlan) -> Result<Vec<StepStatus>> {
        let ctx = self.context();
        let mut statuses = Vec::with_capacity(plan.steps.len());
        for (position, step) in plan.steps.iter().enumerate() {
            statuses.push(StepStatus {
                index: position + 1,
                name: step.name().to_string(),
                state: step.state(&ctx).await?,
            });
        }
        Ok(statuses)
    }
}
