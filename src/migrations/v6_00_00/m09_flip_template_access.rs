//! Migration: Replace template deny lists with role allow lists

use async_trait::async_trait;

use super::PolarityFlip;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};

const FLIP: PolarityFlip = PolarityFlip {
    target: "templates_roles",
    entity_column: "template_id",
    deny_table: "template_no_access",
    entity_table: "templates",
    entity_id: "template_id",
    entity_filter: None,
    // Super admins only
    excluded_roles: &[1],
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
