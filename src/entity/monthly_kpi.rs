//! MonthlyKpi entity
//!
//! Table: org_monthly_kpi. Several reviewers may score the same user and month;
//! the period's KPI is the highest score.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_monthly_kpi")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Scored user
    pub user_id: i64,

    #[sea_orm(nullable)]
    pub reviewer_id: Option<i64>,

    pub year: i32,

    /// 1..=12
    pub month: i32,

    /// 0..=100, enforced by a table CHECK
    pub score: i32,

    #[sea_orm(column_type = "Text")]
    pub comments: String,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::ReviewerId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Reviewer,
}

impl ActiveModelBehavior for ActiveModel {}
