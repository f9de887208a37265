//! Access-request workflow
//!
//! `pending -> approved | denied`, decided exactly once by an admin.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveEnum, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::config::Policy;
use crate::entity::access_request::{self, AccessStatus};
use crate::entity::{department, role, user, user_assignment};
use crate::error::{AppError, AppResult, OptionExt};
use crate::notify::templates;
use crate::permission::authorize;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve,
    Deny,
}

/// An admin's verdict on a pending request
#[derive(Debug, Clone, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    /// Role to grant; required when approving
    #[serde(default)]
    pub role_id: Option<i64>,
    /// Department of the new assignment; the first department when absent
    #[serde(default)]
    pub department_id: Option<i64>,
}

impl Decision {
    pub fn approve(role_id: i64, department_id: Option<i64>) -> Self {
        Self {
            action: DecisionAction::Approve,
            role_id: Some(role_id),
            department_id,
        }
    }

    pub fn deny() -> Self {
        Self {
            action: DecisionAction::Deny,
            role_id: None,
            department_id: None,
        }
    }
}

/// Outcome of [`decide`]
#[derive(Debug, Clone, Serialize)]
pub struct Decided {
    pub request: access_request::Model,
    pub assignment: Option<user_assignment::Model>,
}

/// Open a pending request for `user_id` and tell every admin about it
pub async fn submit(
    state: &AppState,
    user_id: i64,
    reason: &str,
) -> AppResult<access_request::Model> {
    let reason = validation::text("reason", reason, 1, 1000)?;
    let db = &state.db;

    let requester = user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("user {}", user_id))?;

    let txn = db.begin().await?;
    let open = access_request::Entity::find()
        .filter(access_request::Column::UserId.eq(user_id))
        .filter(access_request::Column::Status.eq(AccessStatus::Pending.to_value()))
        .one(&txn)
        .await?;
    if open.is_some() {
        return Err(AppError::Conflict(
            "an access request is already pending".to_string(),
        ));
    }
    let request = access_request::ActiveModel {
        user_id: Set(user_id),
        reason: Set(reason.clone()),
        status: Set(AccessStatus::Pending),
        created_at: Set(Utc::now()),
        decided_at: Set(None),
        decided_by: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(request_id = request.id, user_id, "Access request submitted");

    let notice = admin_emails(db, state.policy())
        .await
        .map(|admins| Some(templates::access_requested(admins, &requester.name, &reason)))
        .map_err(AppError::from);
    state.notify_resolved(notice);

    Ok(request)
}

/// Approve or deny a pending request.
///
/// The status flip is conditional on the row still being pending, so two
/// admins racing on the same request commit at most one decision.
pub async fn decide(
    state: &AppState,
    request_id: i64,
    decision: &Decision,
    actor_id: i64,
) -> AppResult<Decided> {
    let db = &state.db;
    authorize(db, actor_id, state.policy().admin_level).await?;

    let request = access_request::Entity::find_by_id(request_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("access request {}", request_id))?;
    if !request.status.is_pending() {
        return Err(already_decided(request_id));
    }

    let grant = match decision.action {
        DecisionAction::Approve => Some(resolve_grant(db, decision).await?),
        DecisionAction::Deny => None,
    };
    let status = match decision.action {
        DecisionAction::Approve => AccessStatus::Approved,
        DecisionAction::Deny => AccessStatus::Denied,
    };

    let decided_at = Utc::now();
    let txn = db.begin().await?;
    let updated = access_request::Entity::update_many()
        .col_expr(access_request::Column::Status, Expr::value(status.to_value()))
        .col_expr(access_request::Column::DecidedAt, Expr::value(decided_at))
        .col_expr(access_request::Column::DecidedBy, Expr::value(actor_id))
        .filter(access_request::Column::Id.eq(request_id))
        .filter(access_request::Column::Status.eq(AccessStatus::Pending.to_value()))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(already_decided(request_id));
    }

    let assignment = match grant {
        Some((role_id, department_id)) => Some(
            user_assignment::ActiveModel {
                user_id: Set(request.user_id),
                role_id: Set(role_id),
                department_id: Set(department_id),
                ..Default::default()
            }
            .insert(&txn)
            .await?,
        ),
        None => None,
    };
    txn.commit().await?;

    tracing::info!(
        request_id,
        actor_id,
        action = ?decision.action,
        "Access request decided"
    );

    let request = access_request::Model {
        status,
        decided_at: Some(decided_at),
        decided_by: Some(actor_id),
        ..request
    };

    let approved = status == AccessStatus::Approved;
    let notice = user::Entity::find_by_id(request.user_id)
        .one(db)
        .await
        .map(|found| found.map(|r| templates::access_decided(r.email, approved)))
        .map_err(AppError::from);
    state.notify_resolved(notice);

    Ok(Decided {
        request,
        assignment,
    })
}

/// Every request, newest first; admins only
pub async fn list(state: &AppState, actor_id: i64) -> AppResult<Vec<access_request::Model>> {
    authorize(&state.db, actor_id, state.policy().admin_level).await?;
    Ok(access_request::Entity::find()
        .order_by_desc(access_request::Column::CreatedAt)
        .order_by_desc(access_request::Column::Id)
        .all(&state.db)
        .await?)
}

/// Requests filed by `user_id`, newest first
pub async fn for_user(state: &AppState, user_id: i64) -> AppResult<Vec<access_request::Model>> {
    Ok(access_request::Entity::find()
        .filter(access_request::Column::UserId.eq(user_id))
        .order_by_desc(access_request::Column::Id)
        .all(&state.db)
        .await?)
}

fn already_decided(request_id: i64) -> AppError {
    AppError::Conflict(format!("access request {} is no longer pending", request_id))
}

/// Role and department an approval grants
async fn resolve_grant<C: ConnectionTrait>(db: &C, decision: &Decision) -> AppResult<(i64, i64)> {
    let role_id = decision
        .role_id
        .ok_or_else(|| AppError::Validation("role_id is required to approve".to_string()))?;
    role::Entity::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("role {}", role_id))?;

    let department = match decision.department_id {
        Some(id) => department::Entity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_not_found(format!("department {}", id))?,
        None => department::Entity::find()
            .order_by_asc(department::Column::Id)
            .one(db)
            .await?
            .ok_or_else(|| {
                AppError::Validation("no department exists to assign the user to".to_string())
            })?,
    };

    Ok((role_id, department.id))
}

/// Emails of users whose highest role level reaches the admin threshold
pub async fn admin_emails<C: ConnectionTrait>(db: &C, policy: &Policy) -> Result<Vec<String>, DbErr> {
    let role_ids: Vec<i64> = role::Entity::find()
        .select_only()
        .column(role::Column::Id)
        .filter(role::Column::Level.gte(policy.admin_level))
        .into_tuple()
        .all(db)
        .await?;
    if role_ids.is_empty() {
        return Ok(Vec::new());
    }

    let user_ids: BTreeSet<i64> = user_assignment::Entity::find()
        .filter(user_assignment::Column::RoleId.is_in(role_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    Ok(user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .order_by_asc(user::Column::Id)
        .all(db)
        .await?
        .into_iter()
        .map(|u| u.email)
        .collect())
}
