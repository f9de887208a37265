//! Department entity
//!
//! Table: org_department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Department name
    #[sea_orm(column_type = "String(Some(128))")]
    pub name: String,

    /// Parent department (None for a root)
    #[sea_orm(nullable)]
    pub parent_id: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id",
        on_delete = "Restrict"
    )]
    Parent,
}

impl ActiveModelBehavior for ActiveModel {}

/// Department tree node (for API responses)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DepartmentTree {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DepartmentTree>,
}

impl From<Model> for DepartmentTree {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            parent_id: model.parent_id,
            children: Vec::new(),
        }
    }
}
