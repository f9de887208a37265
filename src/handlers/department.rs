//! Department handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::{Deserialize, Serialize};

use crate::directory::department;
use crate::entity::department::{DepartmentTree, Model as Department};
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DepartmentRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Return the nested tree instead of a flat list
    #[serde(default)]
    pub tree: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum DepartmentList {
    Flat(Vec<Department>),
    Tree(Vec<DepartmentTree>),
}

/// GET /api/departments
pub async fn list_departments(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<ApiResponse<DepartmentList>>> {
    let list = if query.tree {
        DepartmentList::Tree(department::tree(&state.db).await?)
    } else {
        DepartmentList::Flat(department::list(&state.db).await?)
    };
    Ok(Json(ApiResponse::success(list)))
}

/// POST /api/departments
pub async fn create_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<DepartmentRequest>,
) -> AppResult<Json<ApiResponse<Department>>> {
    let created = department::create(&state, user.id, &req.name, req.parent_id).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// POST /api/departments/:id
pub async fn update_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<DepartmentRequest>,
) -> AppResult<Json<ApiResponse<Department>>> {
    let updated = department::update(&state, user.id, id, &req.name, req.parent_id).await?;
    Ok(Json(ApiResponse::success(updated)))
}

/// DELETE /api/departments/:id
pub async fn delete_department(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    department::delete(&state, user.id, id).await?;
    Ok(Json(ApiResponse::success_msg("department deleted")))
}
