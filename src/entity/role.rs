//! Role entity
//!
//! Table: org_role

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_role")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Role name (unique)
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub name: String,

    /// Privilege rank, higher grants more
    pub level: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
