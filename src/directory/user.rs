//! Users and their role assignments
//!
//! Visibility is scoped by department: admins see everyone, managers see the
//! members of the departments they manage.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::entity::user::UserResponse;
use crate::entity::{department, role, user, user_assignment};
use crate::error::{AppError, AppResult, OptionExt};
use crate::permission::{authorize, can_view_user, get_or_create_role, Privilege, FRESHER_ROLE};
use crate::state::AppState;
use crate::validation;

pub const PAGE_SIZE: u64 = 20;

/// An assignment with its names resolved
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    pub id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub department_id: i64,
    pub department_name: String,
    pub role_id: i64,
    pub role_name: String,
    pub role_level: i32,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub user: UserResponse,
    pub assignments: Vec<AssignmentView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserPage {
    pub users: Vec<UserResponse>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// Create an account and give it the entry role in the first department
pub async fn register(
    state: &AppState,
    name: &str,
    email: &str,
    password: &str,
) -> AppResult<user::Model> {
    let name = validation::text("name", name, 2, 128)?;
    let email = validation::email(email)?;
    let len = password.chars().count();
    if !(6..=128).contains(&len) {
        return Err(AppError::Validation(
            "password must be between 6 and 128 characters".to_string(),
        ));
    }

    let db = &state.db;
    if find_by_email(db, &email).await?.is_some() {
        return Err(AppError::Conflict(format!("email {} is already registered", email)));
    }
    let password_hash = bcrypt::hash(password, state.config.auth.bcrypt_cost)?;

    let txn = db.begin().await?;
    let created = user::ActiveModel {
        name: Set(name),
        email: Set(email.clone()),
        password_hash: Set(password_hash),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .map_err(|e| email_taken(e, &email))?;

    let first_department = department::Entity::find()
        .order_by_asc(department::Column::Id)
        .one(&txn)
        .await?;
    if let Some(department) = first_department {
        let fresher = get_or_create_role(&txn, FRESHER_ROLE, state.policy().fresher_level).await?;
        user_assignment::ActiveModel {
            user_id: Set(created.id),
            role_id: Set(fresher.id),
            department_id: Set(department.id),
            ..Default::default()
        }
        .insert(&txn)
        .await?;
    }
    txn.commit().await?;

    tracing::info!(user_id = created.id, "User registered");
    Ok(created)
}

/// Check credentials; every failure reads the same to the caller
pub async fn authenticate<C: ConnectionTrait>(
    db: &C,
    email: &str,
    password: &str,
) -> AppResult<user::Model> {
    let invalid = || AppError::Validation("invalid email or password".to_string());

    let email = email.trim().to_lowercase();
    let Some(found) = find_by_email(db, &email).await? else {
        tracing::warn!("Login failed: unknown email");
        return Err(invalid());
    };
    if !bcrypt::verify(password, &found.password_hash).unwrap_or(false) {
        tracing::warn!(user_id = found.id, "Login failed: wrong password");
        return Err(invalid());
    }
    Ok(found)
}

/// A unique-index hit on email means another writer registered it first
fn email_taken(err: DbErr, email: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::Conflict(format!("email {} is already registered", email))
        }
        _ => AppError::Database(err),
    }
}

async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<Option<user::Model>> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?)
}

async fn find_user<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_not_found(format!("user {}", id))
}

/// Users visible to `actor_id`, optionally restricted to one department.
///
/// Pages are 1-based.
pub async fn list_users(
    state: &AppState,
    actor_id: i64,
    department_id: Option<i64>,
    page: u64,
) -> AppResult<UserPage> {
    let db = &state.db;
    let policy = state.policy();
    let actor = Privilege::load(db, actor_id).await?;

    let scope: Option<BTreeSet<i64>> = if actor.is_admin(policy) {
        department_id.map(|d| BTreeSet::from([d]))
    } else {
        let managed = actor.managed_departments(policy);
        if managed.is_empty() {
            return Err(AppError::Forbidden(
                "listing users requires a managed department".to_string(),
            ));
        }
        match department_id {
            Some(d) if !managed.contains(&d) => {
                return Err(AppError::Forbidden(format!(
                    "department {} is outside your scope",
                    d
                )));
            }
            Some(d) => Some(BTreeSet::from([d])),
            None => Some(managed),
        }
    };

    let mut members = user_assignment::Entity::find()
        .select_only()
        .column(user_assignment::Column::UserId);
    if let Some(scope) = scope {
        members = members.filter(user_assignment::Column::DepartmentId.is_in(scope));
    }
    let user_ids: BTreeSet<i64> = members
        .into_tuple::<i64>()
        .all(db)
        .await?
        .into_iter()
        .collect();

    let page = page.max(1);
    if user_ids.is_empty() {
        return Ok(UserPage {
            users: Vec::new(),
            page,
            per_page: PAGE_SIZE,
            total: 0,
        });
    }

    let total = user_ids.len() as u64;
    let offset = (page - 1).saturating_mul(PAGE_SIZE);
    if offset >= total {
        return Ok(UserPage {
            users: Vec::new(),
            page,
            per_page: PAGE_SIZE,
            total,
        });
    }
    let users = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .order_by_asc(user::Column::Id)
        .offset(offset)
        .limit(PAGE_SIZE)
        .all(db)
        .await?
        .into_iter()
        .map(UserResponse::from)
        .collect();

    Ok(UserPage {
        users,
        page,
        per_page: PAGE_SIZE,
        total,
    })
}

async fn ensure_visible(state: &AppState, actor_id: i64, target_id: i64) -> AppResult<()> {
    if can_view_user(&state.db, state.policy(), actor_id, target_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "user {} is outside your scope",
            target_id
        )))
    }
}

/// A user with every assignment it holds
pub async fn user_detail(state: &AppState, actor_id: i64, target_id: i64) -> AppResult<UserDetail> {
    let db = &state.db;
    authorize(db, actor_id, state.policy().manage_level).await?;
    let target = find_user(db, target_id).await?;
    ensure_visible(state, actor_id, target_id).await?;

    let assignments = user_assignment::Entity::find()
        .filter(user_assignment::Column::UserId.eq(target_id))
        .order_by_asc(user_assignment::Column::Id)
        .all(db)
        .await?;

    Ok(UserDetail {
        user: target.into(),
        assignments: describe(db, assignments).await?,
    })
}

/// Change a user's name or email
pub async fn edit_user(
    state: &AppState,
    actor_id: i64,
    target_id: i64,
    name: Option<&str>,
    email: Option<&str>,
) -> AppResult<user::Model> {
    let name = name.map(|n| validation::text("name", n, 2, 128)).transpose()?;
    let email = email.map(validation::email).transpose()?;

    let db = &state.db;
    let target = find_user(db, target_id).await?;
    ensure_visible(state, actor_id, target_id).await?;

    if let Some(email) = &email {
        if let Some(other) = find_by_email(db, email).await? {
            if other.id != target_id {
                return Err(AppError::Conflict(format!(
                    "email {} is already registered",
                    email
                )));
            }
        }
    }

    let mut model: user::ActiveModel = target.into();
    if let Some(name) = name {
        model.name = Set(name);
    }
    if let Some(email) = &email {
        model.email = Set(email.clone());
    }
    let updated = model.update(db).await.map_err(|e| match &email {
        Some(email) => email_taken(e, email),
        None => AppError::Database(e),
    })?;

    tracing::info!(user_id = target_id, actor_id, "User edited");
    Ok(updated)
}

/// Delete a user; assignments, task memberships, requests and KPI rows go with it
pub async fn delete_user(state: &AppState, actor_id: i64, target_id: i64) -> AppResult<()> {
    if actor_id == target_id {
        return Err(AppError::Validation("you cannot delete yourself".to_string()));
    }
    let db = &state.db;
    find_user(db, target_id).await?;
    ensure_visible(state, actor_id, target_id).await?;

    user::Entity::delete_by_id(target_id).exec(db).await?;

    tracing::info!(user_id = target_id, actor_id, "User deleted");
    Ok(())
}

/// Grant `role_id` to `user_id` in `department_id`, replacing the role the
/// user already holds there
pub async fn assign_role(
    state: &AppState,
    actor_id: i64,
    user_id: i64,
    department_id: i64,
    role_id: i64,
) -> AppResult<user_assignment::Model> {
    let db = &state.db;
    let actor = Privilege::load(db, actor_id).await?;
    let role = check_grant(state, &actor, department_id, role_id).await?;
    find_user(db, user_id).await?;

    let txn = db.begin().await?;
    let existing = user_assignment::Entity::find()
        .filter(user_assignment::Column::UserId.eq(user_id))
        .filter(user_assignment::Column::DepartmentId.eq(department_id))
        .one(&txn)
        .await?;
    let assignment = match existing {
        Some(existing) => {
            let mut model: user_assignment::ActiveModel = existing.into();
            model.role_id = Set(role.id);
            model.update(&txn).await?
        }
        None => {
            user_assignment::ActiveModel {
                user_id: Set(user_id),
                role_id: Set(role.id),
                department_id: Set(department_id),
                ..Default::default()
            }
            .insert(&txn)
            .await?
        }
    };
    txn.commit().await?;

    tracing::info!(
        assignment_id = assignment.id,
        user_id,
        department_id,
        role_id,
        actor_id,
        "Role assigned"
    );
    Ok(assignment)
}

/// Assignments the actor may administer
pub async fn list_assignments(state: &AppState, actor_id: i64) -> AppResult<Vec<AssignmentView>> {
    let db = &state.db;
    let policy = state.policy();
    let actor = Privilege::load(db, actor_id).await?;

    let mut query = user_assignment::Entity::find().order_by_asc(user_assignment::Column::Id);
    if !actor.is_admin(policy) {
        let managed = actor.managed_departments(policy);
        if managed.is_empty() {
            return Ok(Vec::new());
        }
        query = query.filter(user_assignment::Column::DepartmentId.is_in(managed));
    }
    describe(db, query.all(db).await?).await
}

pub async fn update_assignment(
    state: &AppState,
    actor_id: i64,
    assignment_id: i64,
    role_id: i64,
) -> AppResult<user_assignment::Model> {
    let db = &state.db;
    let existing = find_assignment(db, assignment_id).await?;
    let actor = Privilege::load(db, actor_id).await?;
    let role = check_grant(state, &actor, existing.department_id, role_id).await?;

    let mut model: user_assignment::ActiveModel = existing.into();
    model.role_id = Set(role.id);
    let updated = model.update(db).await?;

    tracing::info!(assignment_id, role_id, actor_id, "Assignment updated");
    Ok(updated)
}

pub async fn delete_assignment(state: &AppState, actor_id: i64, assignment_id: i64) -> AppResult<()> {
    let db = &state.db;
    let existing = find_assignment(db, assignment_id).await?;
    let actor = Privilege::load(db, actor_id).await?;
    if !actor.can_manage_department(state.policy(), existing.department_id) {
        return Err(AppError::Forbidden(format!(
            "department {} is outside your scope",
            existing.department_id
        )));
    }

    user_assignment::Entity::delete_by_id(assignment_id)
        .exec(db)
        .await?;

    tracing::info!(assignment_id, actor_id, "Assignment deleted");
    Ok(())
}

async fn find_assignment<C: ConnectionTrait>(db: &C, id: i64) -> AppResult<user_assignment::Model> {
    user_assignment::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_not_found(format!("assignment {}", id))
}

/// Scope and ceiling checks shared by every role grant
async fn check_grant(
    state: &AppState,
    actor: &Privilege,
    department_id: i64,
    role_id: i64,
) -> AppResult<role::Model> {
    let db = &state.db;
    let policy = state.policy();
    if !actor.can_manage_department(policy, department_id) {
        return Err(AppError::Forbidden(format!(
            "department {} is outside your scope",
            department_id
        )));
    }
    department::Entity::find_by_id(department_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("department {}", department_id))?;
    let role = role::Entity::find_by_id(role_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("role {}", role_id))?;

    if !actor.is_admin(policy) && role.level > actor.max_role_level() {
        return Err(AppError::Forbidden(format!(
            "cannot grant role level {} above your own",
            role.level
        )));
    }
    Ok(role)
}

async fn describe<C: ConnectionTrait>(
    db: &C,
    assignments: Vec<user_assignment::Model>,
) -> AppResult<Vec<AssignmentView>> {
    if assignments.is_empty() {
        return Ok(Vec::new());
    }
    let user_ids: BTreeSet<i64> = assignments.iter().map(|a| a.user_id).collect();
    let role_ids: BTreeSet<i64> = assignments.iter().map(|a| a.role_id).collect();
    let department_ids: BTreeSet<i64> = assignments.iter().map(|a| a.department_id).collect();

    let users: HashMap<i64, String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u.name))
        .collect();
    let roles: HashMap<i64, role::Model> = role::Entity::find()
        .filter(role::Column::Id.is_in(role_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();
    let departments: HashMap<i64, String> = department::Entity::find()
        .filter(department::Column::Id.is_in(department_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect();

    Ok(assignments
        .into_iter()
        .map(|a| {
            let role = roles.get(&a.role_id);
            AssignmentView {
                id: a.id,
                user_id: a.user_id,
                user_name: users.get(&a.user_id).cloned().unwrap_or_default(),
                department_id: a.department_id,
                department_name: departments.get(&a.department_id).cloned().unwrap_or_default(),
                role_id: a.role_id,
                role_name: role.map(|r| r.name.clone()).unwrap_or_default(),
                role_level: role.map(|r| r.level).unwrap_or_default(),
            }
        })
        .collect())
}
