//! User handlers

use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::directory::user::{self, UserDetail, UserPage};
use crate::entity::user::UserResponse;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    #[serde(default)]
    pub department_id: Option<i64>,
    #[serde(default = "default_page")]
    pub page: u64,
}

fn default_page() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// GET /api/users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<ApiResponse<UserPage>>> {
    let page = user::list_users(&state, current.id, query.department_id, query.page).await?;
    Ok(Json(ApiResponse::success(page)))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<UserDetail>>> {
    let detail = user::user_detail(&state, current.id, id).await?;
    Ok(Json(ApiResponse::success(detail)))
}

/// POST /api/users/:id
pub async fn edit_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(req): Json<EditUserRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let updated = user::edit_user(
        &state,
        current.id,
        id,
        req.name.as_deref(),
        req.email.as_deref(),
    )
    .await?;
    Ok(Json(ApiResponse::success(updated.into())))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<()>>> {
    user::delete_user(&state, current.id, id).await?;
    Ok(Json(ApiResponse::success_msg("user deleted")))
}
