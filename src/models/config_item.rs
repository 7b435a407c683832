use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One unpacked setting; `site_id = 0` holds install-wide values
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub config_id: i32,
    pub site_id: i32,
    pub key: String,
    pub value: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
