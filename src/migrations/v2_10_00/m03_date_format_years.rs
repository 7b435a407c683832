//! Migration: Show four-digit years in the short date formats

use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Condition, Expr};
use serde_json::Value as JsonValue;

use super::update_site_preferences;
use crate::error::Result;
use crate::migrations::{DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::models::site_preferences::SYSTEM_PREFERENCES;
use crate::services::rows::Cell;

/// `(two-digit format, four-digit replacement)`
pub(crate) const DATE_FORMATS: [(&str, &str); 2] =
    [("%n/%j/%y", "%n/%j/%Y"), ("%j-%n-%y", "%j/%n/%Y")];

fn four_digit_year(format: &str) -> Option<&'static str> {
    DATE_FORMATS
        .iter()
        .find(|(old, _)| *old == format)
        .map(|(_, new)| *new)
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, _ctx: &StepContext<'_>) -> Result<StepState> {
        Ok(StepState::Pending)
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        for (old, new) in DATE_FORMATS {
            let changed = ctx
                .db
                .update_rows(
                    "members",
                    vec![("date_format".to_string(), Cell::from(new))],
                    Condition::all().add(Expr::col(Alias::new("date_format")).eq(old)),
                )
                .await?;
            tracing::debug!("Rewrote {} member date formats from {}", changed, old);
        }

        let sites = update_site_preferences(ctx.db, |prefs| {
            let replacement = prefs
                .get("date_format")
                .and_then(JsonValue::as_str)
                .and_then(four_digit_year);
            if let Some(new) = replacement {
                prefs.set("date_format", JsonValue::from(new), SYSTEM_PREFERENCES);
            }
        })
        .await?;
        tracing::info!("Rewrote the date format of {} sites", sites);
        Ok(())
    }
}
