//! 6.0.0: member groups become roles
//!
//! Settings move out of the `sites` blobs into a `config` table, member groups
//! become roles with sparse permission rows, deny lists become allow lists and
//! every `group_id` reference is renamed to `role_id`.

use semver::Version;

use crate::error::Result;
use crate::migrations::{MigrationPlan, StepState};
use crate::services::schema::Field;
use crate::services::storage::Storage;

mod m01_add_config_table;
mod m02_add_roles;
mod m03_add_role_groups;
mod m04_add_permissions;
mod m05_reassign_channels_to_roles;
mod m06_reassign_modules_to_roles;
mod m07_reassign_template_groups_to_roles;
mod m08_flip_status_access;
mod m09_flip_template_access;
mod m10_flip_upload_access;
mod m11_rename_member_group_table;
mod m12_convert_member_group_to_primary_role;
mod m13_reassign_layouts_to_primary_role;
mod m14_reassign_email_cache_to_primary_role;
mod polarity;

pub use m01_add_config_table::CONFIG_RENAMES;
pub use polarity::PolarityFlip;

pub const VERSION: Version = Version::new(6, 0, 0);

pub(crate) const GROUP_ID: &str = "group_id";
pub(crate) const ROLE_ID: &str = "role_id";

pub fn plan() -> MigrationPlan {
    MigrationPlan::new(
        VERSION,
        vec![
            Box::new(m01_add_config_table::Migration),
            Box::new(m02_add_roles::Migration),
            Box::new(m03_add_role_groups::Migration),
            Box::new(m04_add_permissions::Migration),
            Box::new(m05_reassign_channels_to_roles::Migration),
            Box::new(m06_reassign_modules_to_roles::Migration),
            Box::new(m07_reassign_template_groups_to_roles::Migration),
            Box::new(m08_flip_status_access::Migration),
            Box::new(m09_flip_template_access::Migration),
            Box::new(m10_flip_upload_access::Migration),
            Box::new(m11_rename_member_group_table::Migration),
            Box::new(m12_convert_member_group_to_primary_role::Migration),
            Box::new(m13_reassign_layouts_to_primary_role::Migration),
            Box::new(m14_reassign_email_cache_to_primary_role::Migration),
        ],
    )
}

/// New definition of a renamed `group_id` column
fn role_id_field() -> Field {
    Field::int(ROLE_ID)
}

/// A group pivot table whose `group_id` becomes `role_id` and which is then
/// renamed
pub(crate) struct TableReassignment {
    pub from: &'static str,
    pub to: &'static str,
}

impl TableReassignment {
    pub async fn state(&self, db: &dyn Storage) -> Result<StepState> {
        let source = db.table_exists(self.from).await?;
        let target = db.table_exists(self.to).await?;

        Ok(match (source, target) {
            (false, true) => StepState::Applied,
            (true, true) => {
                StepState::Partial(format!("both {} and {} exist", self.from, self.to))
            }
            (true, false) => {
                if db.column_exists(self.from, ROLE_ID).await? {
                    StepState::Partial(format!(
                        "{}.{} was renamed but the table was not",
                        self.from, GROUP_ID
                    ))
                } else {
                    StepState::Pending
                }
            }
            (false, false) => {
                StepState::Partial(format!("neither {} nor {} exists", self.from, self.to))
            }
        })
    }

    pub async fn apply(&self, db: &dyn Storage) -> Result<()> {
        db.modify_column(self.from, GROUP_ID, &role_id_field()).await?;
        db.rename_table(self.from, self.to).await?;
        tracing::info!("Reassigned {} to roles as {}", self.from, self.to);
        Ok(())
    }
}

/// A table that keeps its name but whose `group_id` becomes `role_id`
pub(crate) struct ColumnReassignment {
    pub table: &'static str,
}

impl ColumnReassignment {
    pub async fn state(&self, db: &dyn Storage) -> Result<StepState> {
        if !db.table_exists(self.table).await? {
            return Ok(StepState::Partial(format!("{} does not exist", self.table)));
        }

        let group = db.column_exists(self.table, GROUP_ID).await?;
        let role = db.column_exists(self.table, ROLE_ID).await?;

        Ok(match (group, role) {
            (false, true) => StepState::Applied,
            (true, false) => StepState::Pending,
            (true, true) => StepState::Partial(format!(
                "{} has both {} and {}",
                self.table, GROUP_ID, ROLE_ID
            )),
            (false, false) => StepState::Partial(format!(
                "{} has neither {} nor {}",
                self.table, GROUP_ID, ROLE_ID
            )),
        })
    }

    pub async fn apply(&self, db: &dyn Storage) -> Result<()> {
        db.modify_column(self.table, GROUP_ID, &role_id_field()).await?;
        tracing::info!("Renamed {}.{} to {}", self.table, GROUP_ID, ROLE_ID);
        Ok(())
    }
}
