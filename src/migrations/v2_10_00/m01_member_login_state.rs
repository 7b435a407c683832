//! Migration: Add sessions.login_state

use async_trait::async_trait;

use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::services::schema::Field;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        if ctx.db.column_exists("sessions", "login_state").await? {
            Ok(StepState::Applied)
        } else {
            Ok(StepState::Pending)
        }
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        ctx.db
            .add_column("sessions", &Field::varchar("login_state", 32).nullable())
            .await
    }
}
