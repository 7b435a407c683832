//! Migration: Turn on private messages and attachments for every site

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::update_site_preferences;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::models::site_preferences::MEMBER_PREFERENCES;

const ENABLED: [&str; 2] = ["prv_msg_enabled", "prv_msg_allow_attachments"];

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, _ctx: &StepContext<'_>) -> Result<StepState> {
        Ok(StepState::Pending)
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let sites = update_site_preferences(ctx.db, |prefs| {
            for key in ENABLED {
                prefs.set(key, JsonValue::from("y"), MEMBER_PREFERENCES);
            }
        })
        .await?;
        tracing::info!("Enabled private messages on {} sites", sites);
        Ok(())
    }
}
