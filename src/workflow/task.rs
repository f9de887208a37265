//! Task lifecycle and review workflow
//!
//! Submission is a toggle owned by the assignees; reviews accumulate
//! independently of it.

use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::entity::{project, task, task_assignee, task_review, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::notify::{templates, Email};
use crate::permission::authorize;
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Clone, Deserialize)]
pub struct AssigneeInput {
    pub user_id: i64,
    #[serde(default)]
    pub workload_percent: Option<i32>,
}

/// Fields accepted when creating or editing a task
#[derive(Debug, Clone, Deserialize)]
pub struct TaskInput {
    pub project_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub manager_id: Option<i64>,
    #[serde(default)]
    pub assignees: Vec<AssigneeInput>,
}

/// A task with its assignee rows
#[derive(Debug, Clone, Serialize)]
pub struct TaskDetail {
    #[serde(flatten)]
    pub task: task::Model,
    pub assignees: Vec<task_assignee::Model>,
}

/// Checked form of [`TaskInput`]
struct ValidTask {
    project_id: i64,
    name: String,
    description: Option<String>,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    manager_id: Option<i64>,
    assignees: Vec<(i64, Option<i32>)>,
}

async fn validate_input<C: ConnectionTrait>(db: &C, input: &TaskInput) -> AppResult<ValidTask> {
    let name = validation::text("name", &input.name, 1, 128)?;
    let description = match input.description.as_deref().map(str::trim) {
        Some(d) if !d.is_empty() => Some(validation::text("description", d, 1, 10_000)?),
        _ => None,
    };
    validation::date_range(input.start_date, input.end_date)?;

    let mut seen = BTreeSet::new();
    let mut assignees = Vec::with_capacity(input.assignees.len());
    for a in &input.assignees {
        if !seen.insert(a.user_id) {
            return Err(AppError::Validation(format!(
                "user {} is assigned twice",
                a.user_id
            )));
        }
        assignees.push((a.user_id, validation::workload_percent(a.workload_percent)?));
    }

    project::Entity::find_by_id(input.project_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("project {}", input.project_id))?;

    if let Some(manager_id) = input.manager_id {
        user::Entity::find_by_id(manager_id)
            .one(db)
            .await?
            .ok_or_not_found(format!("user {}", manager_id))?;
    }

    if !seen.is_empty() {
        let found = user::Entity::find()
            .filter(user::Column::Id.is_in(seen.clone()))
            .all(db)
            .await?;
        if found.len() != seen.len() {
            let known: BTreeSet<i64> = found.iter().map(|u| u.id).collect();
            let missing = seen.difference(&known).next().copied().unwrap_or_default();
            return Err(AppError::NotFound(format!("user {}", missing)));
        }
    }

    Ok(ValidTask {
        project_id: input.project_id,
        name,
        description,
        start_date: input.start_date,
        end_date: input.end_date,
        manager_id: input.manager_id,
        assignees,
    })
}

async fn replace_assignees<C: ConnectionTrait>(
    db: &C,
    task_id: i64,
    assignees: &[(i64, Option<i32>)],
) -> AppResult<()> {
    task_assignee::Entity::delete_many()
        .filter(task_assignee::Column::TaskId.eq(task_id))
        .exec(db)
        .await?;
    if assignees.is_empty() {
        return Ok(());
    }
    let rows = assignees.iter().map(|&(user_id, workload_percent)| task_assignee::ActiveModel {
        task_id: Set(task_id),
        user_id: Set(user_id),
        workload_percent: Set(workload_percent),
    });
    task_assignee::Entity::insert_many(rows)
        .exec_without_returning(db)
        .await?;
    Ok(())
}

async fn assignees_of<C: ConnectionTrait>(
    db: &C,
    task_id: i64,
) -> AppResult<Vec<task_assignee::Model>> {
    Ok(task_assignee::Entity::find()
        .filter(task_assignee::Column::TaskId.eq(task_id))
        .order_by_asc(task_assignee::Column::UserId)
        .all(db)
        .await?)
}

async fn find_task<C: ConnectionTrait>(db: &C, task_id: i64) -> AppResult<task::Model> {
    task::Entity::find_by_id(task_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("task {}", task_id))
}

/// Create a task with its assignees
pub async fn create_task(
    state: &AppState,
    actor_id: i64,
    input: &TaskInput,
) -> AppResult<TaskDetail> {
    let db = &state.db;
    authorize(db, actor_id, state.policy().create_level).await?;
    let valid = validate_input(db, input).await?;

    let txn = db.begin().await?;
    let task = task::ActiveModel {
        project_id: Set(valid.project_id),
        name: Set(valid.name),
        description: Set(valid.description),
        start_date: Set(valid.start_date),
        end_date: Set(valid.end_date),
        created_by: Set(Some(actor_id)),
        manager_id: Set(valid.manager_id),
        submitted: Set(false),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    replace_assignees(&txn, task.id, &valid.assignees).await?;
    let assignees = assignees_of(&txn, task.id).await?;
    txn.commit().await?;

    tracing::info!(task_id = task.id, actor_id, "Task created");
    Ok(TaskDetail { task, assignees })
}

/// Edit a task; the assignee set is replaced as a whole
pub async fn update_task(
    state: &AppState,
    actor_id: i64,
    task_id: i64,
    input: &TaskInput,
) -> AppResult<TaskDetail> {
    let db = &state.db;
    authorize(db, actor_id, state.policy().manage_level).await?;
    let existing = find_task(db, task_id).await?;
    let valid = validate_input(db, input).await?;

    let txn = db.begin().await?;
    let mut model: task::ActiveModel = existing.into();
    model.project_id = Set(valid.project_id);
    model.name = Set(valid.name);
    model.description = Set(valid.description);
    model.start_date = Set(valid.start_date);
    model.end_date = Set(valid.end_date);
    model.manager_id = Set(valid.manager_id);
    let task = model.update(&txn).await?;
    replace_assignees(&txn, task_id, &valid.assignees).await?;
    let assignees = assignees_of(&txn, task_id).await?;
    txn.commit().await?;

    tracing::info!(task_id, actor_id, "Task updated");
    Ok(TaskDetail { task, assignees })
}

/// Delete a task together with its reviews and assignee rows
pub async fn delete_task(state: &AppState, actor_id: i64, task_id: i64) -> AppResult<()> {
    let db = &state.db;
    authorize(db, actor_id, state.policy().manage_level).await?;
    find_task(db, task_id).await?;

    let txn = db.begin().await?;
    task_review::Entity::delete_many()
        .filter(task_review::Column::TaskId.eq(task_id))
        .exec(&txn)
        .await?;
    task_assignee::Entity::delete_many()
        .filter(task_assignee::Column::TaskId.eq(task_id))
        .exec(&txn)
        .await?;
    task::Entity::delete_by_id(task_id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(task_id, actor_id, "Task deleted");
    Ok(())
}

pub async fn list_tasks(state: &AppState) -> AppResult<Vec<task::Model>> {
    Ok(task::Entity::find()
        .order_by_asc(task::Column::Id)
        .all(&state.db)
        .await?)
}

pub async fn get_task(state: &AppState, task_id: i64) -> AppResult<TaskDetail> {
    let task = find_task(&state.db, task_id).await?;
    let assignees = assignees_of(&state.db, task_id).await?;
    Ok(TaskDetail { task, assignees })
}

/// Flip the submitted flag; only an assignee may do so.
///
/// Moving to submitted notifies the task manager; moving back is silent.
pub async fn toggle_submission(
    state: &AppState,
    task_id: i64,
    actor_id: i64,
) -> AppResult<task::Model> {
    let db = &state.db;
    let task = find_task(db, task_id).await?;

    let assigned = task_assignee::Entity::find_by_id((task_id, actor_id))
        .one(db)
        .await?
        .is_some();
    if !assigned {
        return Err(AppError::Forbidden(
            "only an assignee can change the submission state".to_string(),
        ));
    }

    let submitted = !task.submitted;
    let txn = db.begin().await?;
    let updated = task::Entity::update_many()
        .col_expr(task::Column::Submitted, Expr::value(submitted))
        .filter(task::Column::Id.eq(task_id))
        .filter(task::Column::Submitted.eq(task.submitted))
        .exec(&txn)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "task {} changed concurrently, reload and retry",
            task_id
        )));
    }
    let task = find_task(&txn, task_id).await?;
    txn.commit().await?;

    tracing::info!(task_id, actor_id, submitted, "Task submission toggled");

    if submitted {
        if let Some(manager_id) = task.manager_id {
            state.notify_resolved(submitted_notice(db, &task, manager_id, actor_id).await);
        }
    }

    Ok(task)
}

async fn submitted_notice<C: ConnectionTrait>(
    db: &C,
    task: &task::Model,
    manager_id: i64,
    actor_id: i64,
) -> AppResult<Option<Email>> {
    let manager = user::Entity::find_by_id(manager_id).one(db).await?;
    let actor = user::Entity::find_by_id(actor_id).one(db).await?;
    Ok(match (manager, actor) {
        (Some(manager), Some(actor)) => Some(templates::task_submitted(
            manager.email,
            &task.name,
            &actor.name,
        )),
        _ => None,
    })
}

/// Append a review and notify the assignees
pub async fn submit_review(
    state: &AppState,
    task_id: i64,
    actor_id: i64,
    score: i32,
    comments: &str,
) -> AppResult<task_review::Model> {
    let score = validation::score(score)?;
    let comments = validation::text("comments", comments, 0, 10_000)?;

    let db = &state.db;
    authorize(db, actor_id, state.policy().manage_level).await?;
    let task = find_task(db, task_id).await?;

    let txn = db.begin().await?;
    let review = task_review::ActiveModel {
        task_id: Set(task_id),
        reviewer_id: Set(Some(actor_id)),
        score: Set(score),
        comments: Set(comments.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(task_id, actor_id, review_id = review.id, score, "Task reviewed");

    state.notify_resolved(reviewed_notice(db, &task, score, &comments).await);

    Ok(review)
}

async fn reviewed_notice<C: ConnectionTrait>(
    db: &C,
    task: &task::Model,
    score: i32,
    comments: &str,
) -> AppResult<Option<Email>> {
    let user_ids: Vec<i64> = assignees_of(db, task.id)
        .await?
        .into_iter()
        .map(|a| a.user_id)
        .collect();
    if user_ids.is_empty() {
        return Ok(None);
    }
    let emails: Vec<String> = user::Entity::find()
        .filter(user::Column::Id.is_in(user_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| u.email)
        .filter(|e| !e.trim().is_empty())
        .collect();
    Ok(Some(templates::task_reviewed(emails, &task.name, score, comments)))
}

/// All reviews of a task, oldest first
pub async fn reviews(state: &AppState, task_id: i64) -> AppResult<Vec<task_review::Model>> {
    find_task(&state.db, task_id).await?;
    Ok(task_review::Entity::find()
        .filter(task_review::Column::TaskId.eq(task_id))
        .order_by_asc(task_review::Column::CreatedAt)
        .order_by_asc(task_review::Column::Id)
        .all(&state.db)
        .await?)
}
