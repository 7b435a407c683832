//! Update driver: picks plans by version and hands them to the runner

use semver::Version;

use crate::error::{MigrationError, Result};
use crate::migrations::runner::{RunReport, Runner, StepStatus};
use crate::migrations::{all_plans, MigrationPlan};

pub struct Updater<'a> {
    runner: Runner<'a>,
    plans: Vec<MigrationPlan>,
}

impl<'a> Updater<'a> {
    /// Driver over every registered plan
    pub fn new(runner: Runner<'a>) -> Self {
        Self::with_plans(runner, all_plans())
    }

    pub fn with_plans(runner: Runner<'a>, mut plans: Vec<MigrationPlan>) -> Self {
        plans.sort_by(|a, b| a.version.cmp(&b.version));
        Self { runner, plans }
    }

    pub fn plans(&self) -> &[MigrationPlan] {
        &self.plans
    }

    fn plan(&self, version: &Version) -> Result<&MigrationPlan> {
        self.plans
            .iter()
            .find(|plan| &plan.version == version)
            .ok_or_else(|| MigrationError::UnknownVersion(version.to_string()))
    }

    pub async fn run_version(&self, version: &Version) -> Result<RunReport> {
        self.runner.run(self.plan(version)?).await
    }

    pub async fn status(&self, version: &Version) -> Result<Vec<StepStatus>> {
        self.runner.inspect(self.plan(version)?).await
    }

    /// Plans with `from < version <= to`, ascending
    pub fn plans_between(&self, from: &Version, to: &Version) -> Vec<&MigrationPlan> {
        self.plans
            .iter()
            .filter(|plan| &plan.version > from && &plan.version <= to)
            .collect()
    }

    /// Run every plan between `from` (exclusive) and `to` (inclusive),
    /// stopping at the first failing plan
    pub async fn upgrade(&self, from: &Version, to: &Version) -> Result<Vec<RunReport>> {
        if from > to {
            return Err(MigrationError::InvalidRange(format!(
                "cannot upgrade backwards from {} to {}",
                from, to
            )));
        }

        let plans = self.plans_between(from, to);
        if plans.is_empty() {
            tracing::info!("No updates between {} and {}", from, to);
        }

        let mut reports = Vec::with_capacity(plans.len());
        for plan in plans {
            reports.push(self.runner.run(plan).await?);
        }
        Ok(reports)
    }
}
