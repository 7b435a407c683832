//! Migration: Assign modules to roles instead of member groups

use async_trait::async_trait;

use super::TableReassignment;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};

const REASSIGNMENT: TableReassignment = TableReassignment {
    from: "module_member_groups",
    to: "module_member_roles",
};

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
