//! Role handlers

use axum::{extract::State, response::Json};

use crate::entity::role;
use crate::error::AppResult;
use crate::permission::list_roles;
use crate::routes::ApiResponse;
use crate::state::AppState;

/// GET /api/roles
pub async fn get_roles(State(state): State<AppState>) -> AppResult<Json<ApiResponse<Vec<role::Model>>>> {
    Ok(Json(ApiResponse::success(list_roles(&state.db).await?)))
}
