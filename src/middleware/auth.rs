//! Authentication middleware
//!
//! Resolves the session's user id into a [`CurrentUser`] request extension.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use sea_orm::EntityTrait;
use serde::Serialize;
use tower_sessions::Session;

use crate::entity::user;
use crate::error::AppError;
use crate::state::AppState;

/// Session key holding the signed-in user id
pub const SESSION_USER_KEY: &str = "user_id";

/// The signed-in user, inserted into request extensions
#[derive(Clone, Debug, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub email: String,
}

impl From<user::Model> for CurrentUser {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
        }
    }
}

/// Paths that don't require authentication
fn is_public_path(path: &str) -> bool {
    if !path.starts_with("/api") {
        return true;
    }
    matches!(
        path,
        "/api/health" | "/api/auth/login" | "/api/auth/register"
    )
}

/// Authentication middleware
pub async fn auth_layer(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    if is_public_path(request.uri().path()) {
        return next.run(request).await;
    }

    let user_id: Option<i64> = match session.get(SESSION_USER_KEY).await {
        Ok(id) => id,
        Err(e) => {
            tracing::warn!("Failed to read session: {}", e);
            None
        }
    };
    let Some(user_id) = user_id else {
        return AppError::Unauthorized.into_response();
    };

    match user::Entity::find_by_id(user_id).one(&state.db).await {
        Ok(Some(found)) => {
            request.extensions_mut().insert(CurrentUser::from(found));
            next.run(request).await
        }
        Ok(None) => {
            tracing::warn!(user_id, "Session refers to a deleted user");
            if let Err(e) = session.flush().await {
                tracing::warn!("Failed to flush session: {}", e);
            }
            AppError::Unauthorized.into_response()
        }
        Err(e) => AppError::Database(e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/health"));
        assert!(is_public_path("/api/auth/login"));
        assert!(is_public_path("/api/auth/register"));
        assert!(is_public_path("/favicon.ico"));
        assert!(!is_public_path("/api/auth/me"));
        assert!(!is_public_path("/api/tasks"));
    }
}
