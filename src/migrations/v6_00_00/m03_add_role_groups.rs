//! Migration: Create role groups and their pivot tables

use async_trait::async_trait;

use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::services::schema::{Field, Key};

const TABLES: [&str; 3] = ["role_groups", "roles_role_groups", "members_role_groups"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        let mut present = Vec::new();
        for table in TABLES {
            if ctx.db.table_exists(table).await? {
                present.push(table);
            }
        }

        Ok(if present.len() == TABLES.len() {
            StepState::Applied
        } else if present.is_empty() {
            StepState::Pending
        } else {
            StepState::Partial(format!("only {} of the role group tables exist", present.join(", ")))
        })
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        ctx.db
            .create_table(
                "role_groups",
                &[
                    Field::int("group_id").auto_increment(),
                    Field::varchar("name", 100),
                ],
                &[Key::primary(&["group_id"])],
            )
            .await?;

        ctx.db
            .create_table(
                "roles_role_groups",
                &[Field::int("role_id"), Field::int("group_id")],
                &[Key::primary(&["role_id", "group_id"])],
            )
            .await?;

        ctx.db
            .create_table(
                "members_role_groups",
                &[Field::int("member_id"), Field::int("group_id")],
                &[Key::primary(&["member_id", "group_id"])],
            )
            .await?;

        Ok(())
    }
}
