//! Role assignment handlers

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::directory::user::{self, AssignmentView};
use crate::entity::user_assignment;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: i64,
    pub department_id: i64,
    pub role_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAssignmentRequest {
    pub role_id: i64,
}

/// GET /api/assignments
pub async fn list_assignments(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<AssignmentView>>>> {
    let assignments = user::list_assignments(&state, current.id).await?;
    Ok(Json(ApiResponse::success(assignments)))
}

/// POST /api/assignments
pub async fn assign_role(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(req): Json<AssignRoleRequest>,
) -> AppResult<Json<ApiResponse<user_assignment::Model>>> {
    let assignment =
        user::assign_role(&state, current.id, req.user_id, req.department_id, req.role_id).await?;
    Ok(Json(ApiResponse::success(assignment)))
}

/// POST /api/assignments/:id
pub async fn update_assignment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<UpdateAssignmentRequest>,
) -> AppResult<Json<ApiResponse<user_assignment::Model>>> {
    let assignment = user::update_assignment(&state, current.id, id, req.role_id).await?;
    Ok(Json(ApiResponse::success(assignment)))
}

/// DELETE /api/assignments/:id
pub async fn delete_assignment(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    user::delete_assignment(&state, current.id, id).await?;
    Ok(Json(ApiResponse::success_msg("assignment deleted")))
}
