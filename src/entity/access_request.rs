//! AccessRequest entity - onboarding approval requests
//!
//! Table: org_access_request

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Request status. `Approved` and `Denied` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "denied")]
    Denied,
}

impl AccessStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, AccessStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_access_request")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// Requesting user
    pub user_id: i64,

    #[sea_orm(column_type = "Text")]
    pub reason: String,

    pub status: AccessStatus,

    pub created_at: DateTimeUtc,

    /// Set once, when the request leaves `Pending`
    #[sea_orm(nullable)]
    pub decided_at: Option<DateTimeUtc>,

    #[sea_orm(nullable)]
    pub decided_by: Option<i64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Requester,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DecidedBy",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Decider,
}

impl ActiveModelBehavior for ActiveModel {}
