//! Authorization engine
//!
//! Privilege is derived, never stored: every check loads the actor's current
//! assignment rows and compares the role levels against the configured
//! [`Policy`] thresholds.

use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

use crate::config::Policy;
use crate::entity::{role, user_assignment};
use crate::error::{AppError, AppResult};

/// One assignment with its role level resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub assignment_id: i64,
    pub department_id: i64,
    pub role_id: i64,
    pub level: i32,
}

/// The assignment set of one user, loaded fresh for a single operation.
#[derive(Debug, Clone, Default)]
pub struct Privilege {
    pub user_id: i64,
    grants: Vec<Grant>,
}

impl Privilege {
    pub fn new(user_id: i64, grants: Vec<Grant>) -> Self {
        Self { user_id, grants }
    }

    /// Load the current assignments of `user_id`
    pub async fn load<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<Self, DbErr> {
        let assignments = user_assignment::Entity::find()
            .filter(user_assignment::Column::UserId.eq(user_id))
            .all(db)
            .await?;
        if assignments.is_empty() {
            return Ok(Self::new(user_id, Vec::new()));
        }

        let role_ids: BTreeSet<i64> = assignments.iter().map(|a| a.role_id).collect();
        let levels: HashMap<i64, i32> = role::Entity::find()
            .filter(role::Column::Id.is_in(role_ids))
            .all(db)
            .await?
            .into_iter()
            .map(|r| (r.id, r.level))
            .collect();

        let grants = assignments
            .into_iter()
            .filter_map(|a| {
                levels.get(&a.role_id).map(|&level| Grant {
                    assignment_id: a.id,
                    department_id: a.department_id,
                    role_id: a.role_id,
                    level,
                })
            })
            .collect();

        Ok(Self::new(user_id, grants))
    }

    pub fn grants(&self) -> &[Grant] {
        &self.grants
    }

    /// Highest role level across all assignments, 0 without any
    pub fn max_role_level(&self) -> i32 {
        self.grants.iter().map(|g| g.level).max().unwrap_or(0)
    }

    /// Departments where the user holds a manager-level assignment
    pub fn managed_departments(&self, policy: &Policy) -> BTreeSet<i64> {
        self.grants
            .iter()
            .filter(|g| g.level >= policy.manage_level)
            .map(|g| g.department_id)
            .collect()
    }

    /// Every department the user is assigned to
    pub fn departments(&self) -> BTreeSet<i64> {
        self.grants.iter().map(|g| g.department_id).collect()
    }

    pub fn has_role(&self, min_level: i32) -> bool {
        self.max_role_level() >= min_level
    }

    /// Gate form of [`Privilege::has_role`]
    pub fn require(&self, min_level: i32) -> AppResult<()> {
        if self.has_role(min_level) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "role level {} required",
                min_level
            )))
        }
    }

    pub fn is_admin(&self, policy: &Policy) -> bool {
        self.has_role(policy.admin_level)
    }

    /// Whether this user manages `department_id` or is an admin
    pub fn can_manage_department(&self, policy: &Policy, department_id: i64) -> bool {
        self.is_admin(policy) || self.managed_departments(policy).contains(&department_id)
    }

    /// Admins see everyone; managers see users sharing one of their managed departments
    pub fn can_view(&self, policy: &Policy, target: &Privilege) -> bool {
        if self.is_admin(policy) {
            return true;
        }
        let managed = self.managed_departments(policy);
        target.departments().iter().any(|d| managed.contains(d))
    }
}

/// Highest role level of `user_id`, 0 if it holds no assignment
pub async fn max_role_level<C: ConnectionTrait>(db: &C, user_id: i64) -> Result<i32, DbErr> {
    Ok(Privilege::load(db, user_id).await?.max_role_level())
}

/// Departments `user_id` manages under `policy`
pub async fn managed_departments<C: ConnectionTrait>(
    db: &C,
    policy: &Policy,
    user_id: i64,
) -> Result<BTreeSet<i64>, DbErr> {
    Ok(Privilege::load(db, user_id).await?.managed_departments(policy))
}

/// `true` iff the highest role level of `user_id` reaches `min_level`
pub async fn require_role<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    min_level: i32,
) -> Result<bool, DbErr> {
    Ok(Privilege::load(db, user_id).await?.has_role(min_level))
}

/// Load the actor's privilege and fail with `Forbidden` below `min_level`
pub async fn authorize<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    min_level: i32,
) -> AppResult<Privilege> {
    let privilege = Privilege::load(db, user_id).await?;
    privilege.require(min_level)?;
    Ok(privilege)
}

/// Whether `actor_id` may see and edit `target_id`
pub async fn can_view_user<C: ConnectionTrait>(
    db: &C,
    policy: &Policy,
    actor_id: i64,
    target_id: i64,
) -> Result<bool, DbErr> {
    let actor = Privilege::load(db, actor_id).await?;
    if actor.is_admin(policy) {
        return Ok(true);
    }
    let target = Privilege::load(db, target_id).await?;
    Ok(actor.can_view(policy, &target))
}

/// Built-in roles, seeded once at startup
pub const DEFAULT_ROLES: [(&str, i32); 9] = [
    ("Center Director", 100),
    ("Deputy Center Director", 90),
    ("General Affairs", 85),
    ("Head of Department", 80),
    ("Deputy Head", 70),
    ("Team Lead", 60),
    ("Specialist", 50),
    (FRESHER_ROLE, 30),
    ("Intern", 10),
];

/// Role granted on registration
pub const FRESHER_ROLE: &str = "Fresher";

/// Return the role named `name`, inserting it with `level` if absent.
///
/// Relies on the unique role name: a concurrent insert loses the race
/// quietly and both callers read the same row.
pub async fn get_or_create_role<C: ConnectionTrait>(
    db: &C,
    name: &str,
    level: i32,
) -> Result<role::Model, DbErr> {
    let row = role::ActiveModel {
        name: Set(name.to_string()),
        level: Set(level),
        ..Default::default()
    };
    let inserted = role::Entity::insert(row)
        .on_conflict(OnConflict::column(role::Column::Name).do_nothing().to_owned())
        .exec(db)
        .await;
    match inserted {
        Ok(_) | Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e),
    }

    role::Entity::find()
        .filter(role::Column::Name.eq(name))
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound(format!("role {}", name)))
}

/// Create default roles if not exist.
///
/// The registration role follows `policy.fresher_level` even when the row
/// was stored under an older configuration.
pub async fn ensure_default_roles<C: ConnectionTrait>(
    db: &C,
    policy: &Policy,
) -> Result<(), DbErr> {
    for (name, level) in DEFAULT_ROLES {
        if name == FRESHER_ROLE {
            continue;
        }
        get_or_create_role(db, name, level).await?;
    }

    let fresher = get_or_create_role(db, FRESHER_ROLE, policy.fresher_level).await?;
    if fresher.level != policy.fresher_level {
        let previous = fresher.level;
        let mut model: role::ActiveModel = fresher.into();
        model.level = Set(policy.fresher_level);
        model.update(db).await?;
        tracing::info!(
            previous,
            level = policy.fresher_level,
            "Fresher role level reconciled"
        );
    }

    tracing::info!("Default roles ensured");
    Ok(())
}

/// All roles, highest level first
pub async fn list_roles<C: ConnectionTrait>(db: &C) -> Result<Vec<role::Model>, DbErr> {
    role::Entity::find()
        .order_by_desc(role::Column::Level)
        .order_by_asc(role::Column::Id)
        .all(db)
        .await
}
