//! Project handlers

use axum::{extract::State, response::Json, Extension};
use serde::Deserialize;

use crate::directory::project;
use crate::entity::project::Model as Project;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub department_id: i64,
}

/// GET /api/projects
pub async fn list_projects(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<Project>>>> {
    Ok(Json(ApiResponse::success(project::list(&state.db).await?)))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateProjectRequest>,
) -> AppResult<Json<ApiResponse<Project>>> {
    let created = project::create(&state, user.id, &req.name, req.department_id).await?;
    Ok(Json(ApiResponse::success(created)))
}
