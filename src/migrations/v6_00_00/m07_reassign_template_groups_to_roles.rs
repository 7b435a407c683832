//! Migration: Assign template groups to roles instead of member groups

use async_trait::async_trait;

use super::TableReassignment;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};

const REASSIGNMENT: TableReassignment = TableReassignment {
    from: "template_member_groups",
    to: "template_groups_roles",
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
