//! Access-request handlers

use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use serde::Deserialize;

use crate::entity::access_request;
use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::permission::Privilege;
use crate::routes::ApiResponse;
use crate::state::AppState;
use crate::workflow::access::{self, Decided, Decision};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub reason: String,
}

/// GET /api/access-requests
///
/// Admins get every request, everyone else their own.
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<access_request::Model>>>> {
    let privilege = Privilege::load(&state.db, user.id).await?;
    let requests = if privilege.is_admin(state.policy()) {
        access::list(&state, user.id).await?
    } else {
        access::for_user(&state, user.id).await?
    };
    Ok(Json(ApiResponse::success(requests)))
}

/// POST /api/access-requests
pub async fn submit_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<SubmitRequest>,
) -> AppResult<Json<ApiResponse<access_request::Model>>> {
    let request = access::submit(&state, user.id, &req.reason).await?;
    Ok(Json(ApiResponse::success(request)))
}

/// POST /api/access-requests/:id/decision
pub async fn decide_request(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(decision): Json<Decision>,
) -> AppResult<Json<ApiResponse<Decided>>> {
    let decided = access::decide(&state, id, &decision, user.id).await?;
    Ok(Json(ApiResponse::success(decided)))
}
