//! Migration: Turn member_groups into role_settings
//!
//! The table loses its compound primary key, so it is rebuilt rather than
//! altered: `role_settings` is created with a surrogate `id`, the remaining
//! columns are copied over and `member_groups` is dropped.

use async_trait::async_trait;

use super::{GROUP_ID, ROLE_ID};
use crate::error::{MigrationError, Result};
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::services::schema::{Field, Key};
use crate::services::storage::Storage;

const MEMBER_GROUPS: &str = "member_groups";
const ROLE_SETTINGS: &str = "role_settings";

/// Columns that now live on `roles`
const MOVED_TO_ROLES: [&str; 2] = ["group_title", "group_description"];

#[derive(DeriveMigrationName)]
pub struct Migration;

impl Migration {
    async fn copy_and_index(db: &dyn Storage, columns: &[(String, String)]) -> Result<u64> {
        let copied = db.copy_rows(MEMBER_GROUPS, ROLE_SETTINGS, columns).await?;
        db.add_key(
            ROLE_SETTINGS,
            &Key::index("role_settings_role_id_site_id", &[ROLE_ID, "site_id"]),
        )
        .await?;
        Ok(copied)
    }
}

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        let source = ctx.db.table_exists(MEMBER_GROUPS).await?;
        let target = ctx.db.table_exists(ROLE_SETTINGS).await?;

        Ok(match (source, target) {
            (false, true) => StepState::Applied,
            (true, false) => StepState::Pending,
            (true, true) => StepState::Partial(format!(
                "both {} and {} exist",
                MEMBER_GROUPS, ROLE_SETTINGS
            )),
            (false, false) => StepState::Partial(format!(
                "neither {} nor {} exists",
                MEMBER_GROUPS, ROLE_SETTINGS
            )),
        })
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let columns = ctx.db.columns(MEMBER_GROUPS).await?;
        if !columns.iter().any(|c| c.name == GROUP_ID) {
            return Err(MigrationError::UnexpectedIntermediateState(format!(
                "{} has no {} column",
                MEMBER_GROUPS, GROUP_ID
            )));
        }

        let mut fields = vec![Field::int("id").auto_increment()];
        let mut copy = Vec::new();
        for column in columns
            .iter()
            .filter(|c| !MOVED_TO_ROLES.contains(&c.name.as_str()))
        {
            if column.name == GROUP_ID {
                fields.push(Field::int(ROLE_ID));
                copy.push((GROUP_ID.to_string(), ROLE_ID.to_string()));
            } else {
                fields.push(column.to_field());
                copy.push((column.name.clone(), column.name.clone()));
            }
        }

        ctx.db
            .create_table(ROLE_SETTINGS, &fields, &[Key::primary(&["id"])])
            .await?;

        let copied = match Self::copy_and_index(ctx.db, &copy).await {
            Ok(copied) => copied,
            Err(e) => {
                tracing::warn!("Copying {} failed, dropping {}: {}", MEMBER_GROUPS, ROLE_SETTINGS, e);
                if let Err(drop_err) = ctx.db.drop_table(ROLE_SETTINGS).await {
                    tracing::error!("Failed to drop {}: {}", ROLE_SETTINGS, drop_err);
                }
                return Err(e);
            }
        };

        ctx.db.drop_table(MEMBER_GROUPS).await?;

        tracing::info!("Moved {} group settings rows into {}", copied, ROLE_SETTINGS);
        Ok(())
    }
}
