//! 2.10.0: login state tracking, category field cleanup and four-digit years

use sea_orm::sea_query::{Alias, Condition, Expr};
use semver::Version;

use crate::error::Result;
use crate::migrations::MigrationPlan;
use crate::models::site_preferences::{SitePreferences, PREFERENCE_COLUMNS};
use crate::services::rows::Kind;
use crate::services::storage::Storage;

mod m01_member_login_state;
mod m02_modify_category_data_fields;
mod m03_date_format_years;
mod m04_add_private_message_options;

pub const VERSION: Version = Version::new(2, 10, 0);

pub fn plan() -> MigrationPlan {
    MigrationPlan::new(
        VERSION,
        vec![
            Box::new(m01_member_login_state::Migration),
            Box::new(m02_modify_category_data_fields::Migration),
            Box::new(m03_date_format_years::Migration),
            Box::new(m04_add_private_message_options::Migration),
        ],
    )
}

/// Apply `edit` to every site's preference blobs and write back the changed
/// ones. Returns the number of sites updated.
pub(crate) async fn update_site_preferences<F>(db: &dyn Storage, mut edit: F) -> Result<u64>
where
    F: FnMut(&mut SitePreferences) + Send,
{
    let mut select = vec![("site_id", Kind::Int)];
    for column in PREFERENCE_COLUMNS {
        if db.column_exists("sites", column).await? {
            select.push((column, Kind::Text));
        }
    }
    if select.len() == 1 {
        tracing::debug!("sites carries no preference blobs, nothing to update");
        return Ok(0);
    }

    let mut updated = 0;
    for row in db.select_rows("sites", &select, None).await? {
        let mut prefs = SitePreferences::from_row(&row)?;
        edit(&mut prefs);
        if !prefs.is_dirty() {
            continue;
        }
        db.update_rows(
            "sites",
            prefs.dirty_columns(),
            Condition::all().add(Expr::col(Alias::new("site_id")).eq(prefs.site_id)),
        )
        .await?;
        updated += 1;
    }
    Ok(updated)
}
