//! Migration: Flatten the member group permission flags into permission rows

use async_trait::async_trait;

use crate::error::Result;
use crate::migrations::{create_and_fill, DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::models::permission::{PermissionSet, LEGACY_PERMISSIONS};
use crate::services::rows::{Kind, Row};
use crate::services::schema::{Field, Key};

const PERMISSIONS: &str = "permissions";
const MEMBER_GROUPS: &str = "member_groups";

#[derive(DeriveMigrationName)]
pub struct Migration;

/// Grants of every group row. A flag cell that is not text fails the step.
fn collect_grants(groups: &[Row], present: &[&str]) -> Result<PermissionSet> {
    let mut grants = PermissionSet::new();
    for group in groups {
        let mut flags = Vec::with_capacity(present.len());
        for flag in present {
            flags.push((*flag, group.opt_text(flag)?));
        }
        grants.add_group(group.int("group_id")?, group.int("site_id")?, |name| {
            flags
                .iter()
                .find(|(flag, _)| *flag == name)
                .and_then(|(_, value)| *value)
        });
    }
    Ok(grants)
}

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        if ctx.db.table_exists(PERMISSIONS).await? {
            Ok(StepState::Applied)
        } else {
            Ok(StepState::Pending)
        }
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let present: Vec<&str> = {
            let columns = ctx.db.columns(MEMBER_GROUPS).await?;
            LEGACY_PERMISSIONS
                .iter()
                .copied()
                .filter(|flag| columns.iter().any(|c| c.name == *flag))
                .collect()
        };

        let mut select = vec![("group_id", Kind::Int), ("site_id", Kind::Int)];
        select.extend(present.iter().map(|flag| (*flag, Kind::Text)));
        let groups = ctx.db.select_rows(MEMBER_GROUPS, &select, None).await?;

        let grants = collect_grants(&groups, &present)?;

        let rows: Vec<Row> = grants
            .into_iter()
            .map(|grant| {
                Row::new()
                    .with("role_id", grant.role_id)
                    .with("site_id", grant.site_id)
                    .with("permission", grant.permission)
            })
            .collect();

        let inserted = create_and_fill(
            ctx.db,
            PERMISSIONS,
            &[
                Field::int("permission_id").auto_increment(),
                Field::int("role_id"),
                Field::int("site_id"),
                Field::varchar("permission", 32),
            ],
            &[
                Key::primary(&["permission_id"]),
                Key::index("role_id_site_id", &["role_id", "site_id"]),
            ],
            rows,
        )
        .await?;

        for flag in &present {
            ctx.db.drop_column(MEMBER_GROUPS, flag).await?;
        }

        tracing::info!(
            "Flattened {} groups into {} permission rows",
            groups.len(),
            inserted
        );
        Ok(())
    }
}
