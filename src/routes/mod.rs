use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session store (in-memory for now)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_http_only(true);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        // Auth
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/me", get(handlers::auth::me))
        // Directory
        .route(
            "/departments",
            get(handlers::department::list_departments).post(handlers::department::create_department),
        )
        .route(
            "/departments/:id",
            post(handlers::department::update_department)
                .delete(handlers::department::delete_department),
        )
        .route(
            "/projects",
            get(handlers::project::list_projects).post(handlers::project::create_project),
        )
        .route("/roles", get(handlers::role::get_roles))
        .route("/users", get(handlers::user::list_users))
        .route(
            "/users/:id",
            get(handlers::user::get_user)
                .post(handlers::user::edit_user)
                .delete(handlers::user::delete_user),
        )
        .route(
            "/assignments",
            get(handlers::assignment::list_assignments).post(handlers::assignment::assign_role),
        )
        .route(
            "/assignments/:id",
            post(handlers::assignment::update_assignment)
                .delete(handlers::assignment::delete_assignment),
        )
        // Tasks
        .route(
            "/tasks",
            get(handlers::task::list_tasks).post(handlers::task::create_task),
        )
        .route(
            "/tasks/:id",
            get(handlers::task::get_task)
                .post(handlers::task::update_task)
                .delete(handlers::task::delete_task),
        )
        .route("/tasks/:id/submission", post(handlers::task::toggle_submission))
        .route(
            "/tasks/:id/reviews",
            get(handlers::task::list_reviews).post(handlers::task::submit_review),
        )
        // Access requests
        .route(
            "/access-requests",
            get(handlers::access::list_requests).post(handlers::access::submit_request),
        )
        .route(
            "/access-requests/:id/decision",
            post(handlers::access::decide_request),
        )
        // KPI
        .route(
            "/users/:id/kpi",
            get(handlers::kpi::get_kpi).post(handlers::kpi::record_kpi),
        )
        .route("/users/:id/tasks", get(handlers::kpi::tasks_in_range));

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (StatusCode::NOT_FOUND, Json(ApiResponse::error("Not Found")))
}
