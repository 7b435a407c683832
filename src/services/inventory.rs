//! Read-only summary of the migrated role model

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::Serialize;

use crate::db::DbConn;
use crate::error::Result;
use crate::models::prelude::*;
use crate::models::{config_item, permission_row, role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSummary {
    pub role_id: i32,
    pub name: String,
    pub permissions: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Inventory {
    pub roles: Vec<RoleSummary>,
    pub permission_rows: u64,
    pub site_config_rows: u64,
    pub global_config_rows: u64,
}

/// Count what the 6.0.0 update produced. Fails if the tables do not exist yet.
pub async fn summarize(db: &DbConn) -> Result<Inventory> {
    let mut roles = Vec::new();
    for model in Role::find()
        .order_by_asc(role::Column::RoleId)
        .all(db)
        .await?
    {
        let permissions = PermissionRow::find()
            .filter(permission_row::Column::RoleId.eq(model.role_id))
            .count(db)
            .await?;
        roles.push(RoleSummary {
            role_id: model.role_id,
            name: model.name,
            permissions,
        });
    }

    let permission_rows = PermissionRow::find().count(db).await?;

    let global_config_rows = ConfigItem::find()
        .filter(config_item::Column::SiteId.eq(0))
        .count(db)
        .await?;
    let site_config_rows = ConfigItem::find().count(db).await? - global_config_rows;

    Ok(Inventory {
        roles,
        permission_rows,
        site_config_rows,
        global_config_rows,
    })
}

/// Permission names granted to `role_id` on `site_id`, sorted
pub async fn granted_permissions(db: &DbConn, role_id: i32, site_id: i32) -> Result<Vec<String>> {
    Ok(PermissionRow::find()
        .filter(permission_row::Column::RoleId.eq(role_id))
        .filter(permission_row::Column::SiteId.eq(site_id))
        .order_by_asc(permission_row::Column::Permission)
        .all(db)
        .await?
        .into_iter()
        .map(|row| row.permission)
        .collect())
}
