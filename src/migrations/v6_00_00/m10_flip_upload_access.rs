//! Migration: Replace upload destination deny lists with role allow lists

use async_trait::async_trait;

use super::PolarityFlip;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};

const FLIP: PolarityFlip = PolarityFlip {
    target: "upload_prefs_roles",
    entity_column: "upload_id",
    deny_table: "upload_no_access",
    entity_table: "upload_prefs",
    entity_id: "id",
    // Destinations owned by add-ons are not user facing
    entity_filter: Some(("module_id", 0)),
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
