//! TaskReview entity
//!
//! Table: org_task_review. Every review is kept; there is no "final" review.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_task_review")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub task_id: i64,

    #[sea_orm(nullable)]
    pub reviewer_id: Option<i64>,

    /// 0..=100, enforced by a table CHECK
    pub score: i32,

    #[sea_orm(column_type = "Text")]
    pub comments: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::task::Entity",
        from = "Column::TaskId",
        to = "super::task::Column::Id",
        on_delete = "Cascade"
    )]
    Task,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Reviewer,
}

impl ActiveModelBehavior for ActiveModel {}
