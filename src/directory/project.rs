use chrono::Utc;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, QueryOrder, Set};

use crate::entity::{department, project};
use crate::error::{AppResult, OptionExt};
use crate::permission::authorize;
use crate::state::AppState;
use crate::validation;

pub async fn list<C: ConnectionTrait>(db: &C) -> AppResult<Vec<project::Model>> {
    Ok(project::Entity::find()
        .order_by_asc(project::Column::Id)
        .all(db)
        .await?)
}

/// Create a project owned by `department_id`
pub async fn create(
    state: &AppState,
    actor_id: i64,
    name: &str,
    department_id: i64,
) -> AppResult<project::Model> {
    let name = validation::text("name", name, 1, 128)?;
    let db = &state.db;
    authorize(db, actor_id, state.policy().create_level).await?;
    department::Entity::find_by_id(department_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("department {}", department_id))?;

    let created = project::ActiveModel {
        name: Set(name),
        department_id: Set(department_id),
        creator_id: Set(Some(actor_id)),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(project_id = created.id, actor_id, "Project created");
    Ok(created)
}
