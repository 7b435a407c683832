//! Migration: A member's group becomes their primary role

use async_trait::async_trait;

use super::ColumnReassignment;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};

const REASSIGNMENT: ColumnReassignment = ColumnReassignment { table: "members" };

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        REASSIGNMENT.state(ctx.db).await
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        REASSIGNMENT.apply(ctx.db).await
    }
}
