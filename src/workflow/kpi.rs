//! Monthly KPI records and the task view used to score them

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;

use crate::entity::{monthly_kpi, task, task_assignee, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::permission::authorize;
use crate::state::AppState;
use crate::validation;

/// Highest score of a period plus the rows it was taken from
#[derive(Debug, Clone, Serialize)]
pub struct KpiSummary {
    pub user_id: i64,
    pub year: i32,
    pub month: i32,
    pub highest: Option<i32>,
    pub records: Vec<monthly_kpi::Model>,
}

/// Append a KPI row for `user_id`; earlier rows for the period are kept
pub async fn record_kpi(
    state: &AppState,
    user_id: i64,
    reviewer_id: i64,
    year: i32,
    month: i32,
    score: i32,
    comments: &str,
) -> AppResult<monthly_kpi::Model> {
    let score = validation::score(score)?;
    validation::period(year, month)?;
    let comments = validation::text("comments", comments, 0, 10_000)?;

    let db = &state.db;
    authorize(db, reviewer_id, state.policy().manage_level).await?;
    user::Entity::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_not_found(format!("user {}", user_id))?;

    let record = monthly_kpi::ActiveModel {
        user_id: Set(user_id),
        reviewer_id: Set(Some(reviewer_id)),
        year: Set(year),
        month: Set(month),
        score: Set(score),
        comments: Set(comments),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    tracing::info!(user_id, reviewer_id, year, month, score, "KPI recorded");
    Ok(record)
}

/// Maximum recorded score for the period, `None` when nothing was recorded
pub async fn highest_kpi<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    year: i32,
    month: i32,
) -> AppResult<Option<i32>> {
    let scores: Vec<i32> = monthly_kpi::Entity::find()
        .select_only()
        .column(monthly_kpi::Column::Score)
        .filter(monthly_kpi::Column::UserId.eq(user_id))
        .filter(monthly_kpi::Column::Year.eq(year))
        .filter(monthly_kpi::Column::Month.eq(month))
        .into_tuple()
        .all(db)
        .await?;
    Ok(scores.into_iter().max())
}

/// Every row recorded for the period, oldest first
pub async fn kpi_history<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    year: i32,
    month: i32,
) -> AppResult<Vec<monthly_kpi::Model>> {
    validation::period(year, month)?;
    Ok(monthly_kpi::Entity::find()
        .filter(monthly_kpi::Column::UserId.eq(user_id))
        .filter(monthly_kpi::Column::Year.eq(year))
        .filter(monthly_kpi::Column::Month.eq(month))
        .order_by_asc(monthly_kpi::Column::Id)
        .all(db)
        .await?)
}

pub async fn summary<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    year: i32,
    month: i32,
) -> AppResult<KpiSummary> {
    let records = kpi_history(db, user_id, year, month).await?;
    let highest = highest_kpi(db, user_id, year, month).await?;
    Ok(KpiSummary {
        user_id,
        year,
        month,
        highest,
        records,
    })
}

/// Tasks assigned to `user_id` whose start date falls in `[start, end]`.
///
/// Tasks without a start date never match.
pub async fn tasks_in_range<C: ConnectionTrait>(
    db: &C,
    user_id: i64,
    start: NaiveDate,
    end: NaiveDate,
    completed_only: bool,
) -> AppResult<Vec<task::Model>> {
    if start > end {
        return Err(AppError::Validation(format!(
            "range start {} is after end {}",
            start, end
        )));
    }

    let task_ids: Vec<i64> = task_assignee::Entity::find()
        .select_only()
        .column(task_assignee::Column::TaskId)
        .filter(task_assignee::Column::UserId.eq(user_id))
        .into_tuple()
        .all(db)
        .await?;
    if task_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = task::Entity::find()
        .filter(task::Column::Id.is_in(task_ids))
        .filter(task::Column::StartDate.between(start, end));
    if completed_only {
        query = query.filter(task::Column::Submitted.eq(true));
    }
    Ok(query
        .order_by_asc(task::Column::StartDate)
        .order_by_asc(task::Column::Id)
        .all(db)
        .await?)
}
