//! Migration: Make every custom category field column nullable text
//!
//! Safe to repeat, so the step always reports pending.

use async_trait::async_trait;

use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::services::rows::Kind;
use crate::services::schema::Field;

const FIELD_DATA: &str = "category_field_data";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, _ctx: &StepContext<'_>) -> Result<StepState> {
        Ok(StepState::Pending)
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let fields = ctx
            .db
            .select_rows("category_fields", &[("field_id", Kind::Int)], None)
            .await?;

        for field in fields {
            let column = format!("field_id_{}", field.int("field_id")?);
            if !ctx.db.column_exists(FIELD_DATA, &column).await? {
                tracing::debug!("{}.{} does not exist, skipping", FIELD_DATA, column);
                continue;
            }
            ctx.db
                .modify_column(FIELD_DATA, &column, &Field::text(column.clone()).nullable())
                .await?;
        }
        Ok(())
    }
}
