//! Task handlers

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::entity::{task, task_review};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::workflow::task::{self as workflow, TaskDetail, TaskInput};

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub score: i32,
    #[serde(default)]
    pub comments: String,
}

/// GET /api/tasks
pub async fn list_tasks(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<task::Model>>>> {
    Ok(Json(ApiResponse::success(workflow::list_tasks(&state).await?)))
}

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(input): Json<TaskInput>,
) -> AppResult<Json<ApiResponse<TaskDetail>>> {
    let created = workflow::create_task(&state, user.id, &input).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// GET /api/tasks/:id
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<TaskDetail>>> {
    Ok(Json(ApiResponse::success(workflow::get_task(&state, id).await?)))
}

/// POST /api/tasks/:id
pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(input): Json<TaskInput>,
) -> AppResult<Json<ApiResponse<TaskDetail>>> {
    let updated = workflow::update_task(&state, user.id, id, &input).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/tasks/:id
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    workflow::delete_task(&state, user.id, id).await?;
    Ok(Json(ApiResponse::success_msg("task deleted")))
}

/// POST /api/tasks/:id/submission
pub async fn toggle_submission(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<task::Model>>> {
    let task = workflow::toggle_submission(&state, id, user.id).await?;
    Ok(Json(ApiResponse::success(task)))
}

/// GET /api/tasks/:id/reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<task_review::Model>>>> {
    Ok(Json(ApiResponse::success(workflow::reviews(&state, id).await?)))
}

/// POST /api/tasks/:id/reviews
pub async fn submit_review(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<ReviewRequest>,
) -> AppResult<Json<ApiResponse<task_review::Model>>> {
    let review = workflow::submit_review(&state, id, user.id, req.score, &req.comments).await?;
    Ok(Json(ApiResponse::success(review)))
}
