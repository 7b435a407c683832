//! Migration: Replace status deny lists with role allow lists

use async_trait::async_trait;

use super::PolarityFlip;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};

const FLIP: PolarityFlip = PolarityFlip {
    target: "statuses_roles",
    entity_column: "status_id",
    deny_table: "status_no_access",
    entity_table: "statuses",
    entity_id: "status_id",
    entity_filter: None,
    // Super admins, banned, guests and pending members
    excluded_roles: &[1, 2, 3, 4],
};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        FLIP.state(ctx.db).await
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        FLIP.apply(ctx.db).await
    }
}
