//! Authentication handlers
//!
//! Registration, login, logout, and the current user endpoint

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::directory;
use crate::entity::user::UserResponse;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{CurrentUser, SESSION_USER_KEY};
use crate::permission::{Grant, Privilege};
use crate::routes::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Current user with the privilege derived from its assignments
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: CurrentUser,
    pub max_role_level: i32,
    pub is_admin: bool,
    pub grants: Vec<Grant>,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let created = directory::user::register(&state, &req.name, &req.email, &req.password).await?;
    Ok(Json(ApiResponse::success(created.into())))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<UserResponse>>> {
    let found = directory::user::authenticate(&state.db, &req.email, &req.password).await?;

    session
        .insert(SESSION_USER_KEY, found.id)
        .await
        .map_err(|e| AppError::Internal(format!("failed to save session: {}", e)))?;

    tracing::info!(user_id = found.id, "User logged in");
    Ok(Json(ApiResponse::success(found.into())))
}

/// POST /api/auth/logout
pub async fn logout(
    session: Session,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<()>>> {
    session
        .flush()
        .await
        .map_err(|e| AppError::Internal(format!("failed to flush session: {}", e)))?;

    tracing::info!(user_id = user.id, "User logged out");
    Ok(Json(ApiResponse::success_msg("logout success")))
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<MeResponse>>> {
    let privilege = Privilege::load(&state.db, user.id).await?;
    Ok(Json(ApiResponse::success(MeResponse {
        max_role_level: privilege.max_role_level(),
        is_admin: privilege.is_admin(state.policy()),
        grants: privilege.grants().to_vec(),
        user,
    })))
}
