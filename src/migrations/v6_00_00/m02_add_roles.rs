//! Migration: Create roles from the site 1 member groups

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Condition, Expr};

use crate::error::Result;
use crate::migrations::{create_and_fill, DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::services::rows::{Kind, Row};
use crate::services::schema::{Field, Key};

const ROLES: &str = "roles";
const MEMBERS_ROLES: &str = "members_roles";

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        let roles = ctx.db.table_exists(ROLES).await?;
        let members_roles = ctx.db.table_exists(MEMBERS_ROLES).await?;

        Ok(match (roles, members_roles) {
            (true, true) => StepState::Applied,
            (false, false) => StepState::Pending,
            (true, false) => StepState::Partial(format!("{} exists without {}", ROLES, MEMBERS_ROLES)),
            (false, true) => StepState::Partial(format!("{} exists without {}", MEMBERS_ROLES, ROLES)),
        })
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        // Role ids keep the group ids so every group_id reference stays valid
        let roles = ctx
            .db
            .select_rows(
                "member_groups",
                &[
                    ("group_id", Kind::Int),
                    ("group_title", Kind::Text),
                    ("group_description", Kind::Text),
                ],
                Some(Condition::all().add(Expr::col(Alias::new("site_id")).eq(1))),
            )
            .await?
            .into_iter()
            .map(|group| -> Result<Row> {
                Ok(Row::new()
                    .with("role_id", group.int("group_id")?)
                    .with("name", group.text("group_title")?)
                    .with("description", group.opt_text("group_description")?))
            })
            .collect::<Result<Vec<_>>>()?;

        let memberships = ctx
            .db
            .select_rows(
                "members",
                &[("member_id", Kind::Int), ("group_id", Kind::Int)],
                None,
            )
            .await?
            .into_iter()
            .map(|member| -> Result<Row> {
                Ok(Row::new()
                    .with("member_id", member.int("member_id")?)
                    .with("role_id", member.int("group_id")?))
            })
            .collect::<Result<Vec<_>>>()?;

        let role_count = create_and_fill(
            ctx.db,
            ROLES,
            &[
                Field::int("role_id").auto_increment(),
                Field::varchar("name", 100),
                Field::text("description").nullable(),
            ],
            &[Key::primary(&["role_id"])],
            roles,
        )
        .await?;

        let member_count = match create_and_fill(
            ctx.db,
            MEMBERS_ROLES,
            &[Field::int("member_id"), Field::int("role_id")],
            &[Key::primary(&["member_id", "role_id"])],
            memberships,
        )
        .await
        {
            Ok(count) => count,
            Err(e) => {
                // Leave neither table behind so the guard reads pending again
                if let Err(drop_err) = ctx.db.drop_table(ROLES).await {
                    tracing::error!("Failed to drop {} after a failed insert: {}", ROLES, drop_err);
                }
                return Err(e);
            }
        };

        tracing::info!(
            "Created {} roles and {} member assignments",
            role_count,
            member_count
        );
        Ok(())
    }
}
