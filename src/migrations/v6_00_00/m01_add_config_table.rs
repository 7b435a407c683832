//! Migration: Unpack the site preference blobs into the config table

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::migrations::{create_and_fill, DeriveMigrationName, MigrationStep, StepContext, StepState};
use crate::models::site_preferences::{config_value, SitePreferences, PREFERENCE_COLUMNS};
use crate::services::rows::{Kind, Row};
use crate::services::schema::{Field, Key};

const CONFIG: &str = "config";
const SITES: &str = "sites";

/// Preference keys stored under a new name
pub const CONFIG_RENAMES: &[(&str, &str)] = &[("default_member_group", "default_primary_role")];

fn config_key(key: &str) -> &str {
    CONFIG_RENAMES
        .iter()
        .find(|(from, _)| *from == key)
        .map(|(_, to)| *to)
        .unwrap_or(key)
}

#[derive(DeriveMigrationName)]
pub struct Migration;

impl Migration {
    async fn blob_columns(ctx: &StepContext<'_>) -> Result<Vec<&'static str>> {
        let mut present = Vec::new();
        for column in PREFERENCE_COLUMNS {
            if ctx.db.column_exists(SITES, column).await? {
                present.push(column);
            }
        }
        Ok(present)
    }
}

/// One value per `(site_id, key)`. Within a site a key seen again in a later
/// blob column replaces the earlier value.
pub(crate) fn unpack(sites: &[SitePreferences]) -> BTreeMap<(i64, String), Option<String>> {
    let mut values = BTreeMap::new();
    for site in sites {
        let mut seen_in: BTreeMap<String, &str> = BTreeMap::new();
        for (column, key, value) in site.entries() {
            let key = config_key(key).to_string();
            if let Some(earlier) = seen_in.insert(key.clone(), column) {
                tracing::warn!(
                    "Site {} sets '{}' in both {} and {}; keeping the {} value",
                    site.site_id,
                    key,
                    earlier,
                    column,
                    column
                );
            }
            values.insert((site.site_id, key), config_value(value));
        }
    }
    values
}

#[async_trait]
impl MigrationStep for Migration {
    async fn state(&self, ctx: &StepContext<'_>) -> Result<StepState> {
        if ctx.db.table_exists(CONFIG).await? {
            return Ok(StepState::Applied);
        }
        if Self::blob_columns(ctx).await?.is_empty() {
            return Ok(StepState::Partial(format!(
                "{} is missing but the preference columns are already gone from {}",
                CONFIG, SITES
            )));
        }
        Ok(StepState::Pending)
    }

    async fn apply(&self, ctx: &StepContext<'_>) -> Result<()> {
        let columns = Self::blob_columns(ctx).await?;

        let mut select = vec![("site_id", Kind::Int)];
        select.extend(columns.iter().map(|c| (*c, Kind::Text)));
        let sites = ctx
            .db
            .select_rows(SITES, &select, None)
            .await?
            .iter()
            .map(SitePreferences::from_row)
            .collect::<Result<Vec<_>>>()?;

        let mut values = unpack(&sites);
        for (key, value) in ctx.install.global_rows() {
            match values.entry((0, key.to_string())) {
                Entry::Vacant(slot) => {
                    slot.insert(Some(value.to_string()));
                }
                Entry::Occupied(_) => {
                    tracing::warn!("Global config key '{}' already set by a site blob", key)
                }
            }
        }

        let rows: Vec<Row> = values
            .into_iter()
            .map(|((site_id, key), value)| {
                Row::new()
                    .with("site_id", site_id)
                    .with("key", key)
                    .with("value", value)
            })
            .collect();
        let total = rows.len();

        create_and_fill(
            ctx.db,
            CONFIG,
            &[
                Field::int("config_id").auto_increment(),
                Field::int("site_id").default(0),
                Field::varchar("key", 64).default(""),
                Field::text("value").nullable(),
            ],
            &[
                Key::primary(&["config_id"]),
                Key::index("config_site_id_key", &["site_id", "key"]),
            ],
            rows,
        )
        .await?;

        for column in columns {
            ctx.db.drop_column(SITES, column).await?;
        }

        tracing::info!(
            "Unpacked {} config rows from {} sites",
            total,
            sites.len()
        );
        Ok(())
    }
}
