//! Versioned update plans
//!
//! A plan is an ordered list of steps for one version. Each step lives in its
//! own module and is named after its file, so step identity is fixed at
//! compile time.

pub use sea_orm_migration::prelude::{DeriveMigrationName, MigrationName};

use async_trait::async_trait;
use semver::Version;

use crate::config::InstallConfig;
use crate::error::{MigrationError, Result};
use crate::services::rows::Row;
use crate::services::schema::{Field, Key};
use crate::services::storage::Storage;

pub mod progress;
pub mod runner;
pub mod v2_10_00;
pub mod v6_00_00;

/// What a step's guard reports about the live schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    /// The step's end state is already in place
    Applied,
    /// Nothing of the step is in place
    Pending,
    /// Some but not all of the step is in place
    Partial(String),
}

impl StepState {
    pub fn label(&self) -> &'static str {
        match self {
            StepState::Applied => "applied",
            StepState::Pending => "pending",
            StepState::Partial(_) => "partial",
        }
    }
}

/// Everything a step may use while it runs
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub db: &'a dyn Storage,
    pub install: &'a InstallConfig,
}

#[async_trait]
pub trait MigrationStep: MigrationName + Send + Sync {
    /// Side-effect free check of whether the step has run
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState>;

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()>;
}

pub struct MigrationPlan {
    pub version: Version,
    pub steps: Vec<Box<dyn MigrationStep>>,
}

impl MigrationPlan {
    pub fn new(version: Version, steps: Vec<Box<dyn MigrationStep>>) -> Self {
        Self { version, steps }
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.name()).collect()
    }
}

impl std::fmt::Debug for MigrationPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationPlan")
            .field("version", &self.version)
            .field("steps", &self.step_names())
            .finish()
    }
}

/// Every registered plan, ascending by version
pub fn all_plans() -> Vec<MigrationPlan> {
    vec![v2_10_00::plan(), v6_00_00::plan()]
}

pub fn plan_for(version: &Version) -> Result<MigrationPlan> {
    all_plans()
        .into_iter()
        .find(|plan| &plan.version == version)
        .ok_or_else(|| MigrationError::UnknownVersion(version.to_string()))
}

/// Create `table` and fill it with `rows`. If the insert fails the new table
/// is dropped again so the step's guard reads "not applied" on the next run.
/// Auto-increment counters are moved past the inserted ids.
pub(crate) async fn create_and_fill(
    db: &dyn Storage,
    table: &str,
    fields: &[Field],
    keys: &[Key],
    rows: Vec<Row>,
) -> Result<u64> {
    db.create_table(table, fields, keys).await?;

    let inserted = match db.insert_batch(table, rows).await {
        Ok(inserted) => inserted,
        Err(e) => {
            tracing::warn!("Filling {} failed, dropping it again: {}", table, e);
            if let Err(drop_err) = db.drop_table(table).await {
                tracing::error!("Failed to drop {} after a failed insert: {}", table, drop_err);
            }
            return Err(match e {
                MigrationError::RowTransformationFailed(_) => e,
                other => MigrationError::RowTransformationFailed(other.to_string()),
            });
        }
    };

    for field in fields.iter().filter(|f| f.auto_increment) {
        if let Err(e) = db.sync_sequence(table, &field.name).await {
            tracing::warn!("Syncing {}.{} failed, dropping {}: {}", table, field.name, table, e);
            if let Err(drop_err) = db.drop_table(table).await {
                tracing::error!("Failed to drop {}: {}", table, drop_err);
            }
            return Err(e);
        }
    }

    tracing::debug!("Filled {} with {} rows", table, inserted);
    Ok(inserted)
}
