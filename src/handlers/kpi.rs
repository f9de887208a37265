//! KPI handlers
//!
//! A user may always read its own figures; anyone else needs visibility over
//! the target.

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::entity::{monthly_kpi, task};
use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::permission::can_view_user;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::workflow::kpi::{self, KpiSummary};

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub year: i32,
    pub month: i32,
}

#[derive(Debug, Deserialize)]
pub struct RecordKpiRequest {
    pub year: i32,
    pub month: i32,
    pub score: i32,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default)]
    pub completed_only: bool,
}

async fn ensure_visible(state: &AppState, actor_id: i64, target_id: i64) -> AppResult<()> {
    if actor_id == target_id || can_view_user(&state.db, state.policy(), actor_id, target_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "user {} is outside your scope",
            target_id
        )))
    }
}

/// GET /api/users/:id/kpi?year=&month=
pub async fn get_kpi(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Query(period): Query<PeriodQuery>,
) -> AppResult<Json<ApiResponse<KpiSummary>>> {
    ensure_visible(&state, user.id, id).await?;
    let summary = kpi::summary(&state.db, id, period.year, period.month).await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// POST /api/users/:id/kpi
pub async fn record_kpi(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<RecordKpiRequest>,
) -> AppResult<Json<ApiResponse<monthly_kpi::Model>>> {
    let record = kpi::record_kpi(
        &state,
        id,
        user.id,
        req.year,
        req.month,
        req.score,
        &req.comments,
    )
    .await?;
    Ok(Json(ApiResponse::success(record)))
}

/// GET /api/users/:id/tasks?start=&end=&completed_only=
pub async fn tasks_in_range(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Query(range): Query<RangeQuery>,
) -> AppResult<Json<ApiResponse<Vec<task::Model>>>> {
    ensure_visible(&state, user.id, id).await?;
    let tasks =
        kpi::tasks_in_range(&state.db, id, range.start, range.end, range.completed_only).await?;
    Ok(Json(ApiResponse::success(tasks)))
}
