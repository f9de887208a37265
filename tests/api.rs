mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::*;
use orgdesk::routes::create_router;

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, set_cookie, json)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, cookie, _) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    cookie.expect("session cookie")
}

#[tokio::test]
async fn test_health_is_public() {
    let app = TestApp::new().await;
    let router = create_router(app.state.clone());

    let (status, _, body) = send(&router, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], json!(true));
    assert_eq!(body["data"]["status"], json!("healthy"));
}

#[tokio::test]
async fn test_protected_routes_need_session() {
    let app = TestApp::new().await;
    let router = create_router(app.state.clone());

    let (status, _, body) = send(&router, Method::GET, "/api/tasks", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], json!(401));
}

#[tokio::test]
async fn test_register_login_and_error_contract() {
    let app = TestApp::new().await;
    let state = app.state.clone();
    create_department(&state, "HQ", None).await;
    let router = create_router(state);

    let (status, _, body) = send(
        &router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({ "name": "Ann Lee", "email": "ann@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], json!("ann@example.com"));
    assert!(body["data"].get("password_hash").is_none());

    let (status, _, _) = send(
        &router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "ann@example.com", "password": "wrong!" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let cookie = login(&router, "ann@example.com", "secret1").await;

    let (status, _, me) = send(&router, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["max_role_level"], json!(30));
    assert_eq!(me["data"]["is_admin"], json!(false));

    // A fresher cannot create departments.
    let (status, _, body) = send(
        &router,
        Method::POST,
        "/api/departments",
        Some(&cookie),
        Some(json!({ "name": "Ops" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], json!(403));
    assert_eq!(body["message"], json!("Forbidden"));

    let (status, _, _) = send(
        &router,
        Method::POST,
        "/api/access-requests",
        Some(&cookie),
        Some(json!({ "reason": "  " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, body) = send(
        &router,
        Method::POST,
        "/api/access-requests",
        Some(&cookie),
        Some(json!({ "reason": "need more access" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("pending"));

    let (status, _, _) = send(
        &router,
        Method::POST,
        "/api/access-requests",
        Some(&cookie),
        Some(json!({ "reason": "again" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, _) = send(&router, Method::GET, "/api/tasks/9999", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(&router, Method::POST, "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _, _) = send(&router, Method::GET, "/api/auth/me", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_decides_over_http() {
    let app = TestApp::new().await;
    let state = app.state.clone();
    let hq = create_department(&state, "HQ", None).await;
    let router = create_router(state.clone());

    for (name, email) in [("Root User", "root@example.com"), ("Ann Lee", "ann@example.com")] {
        let (status, _, _) = send(
            &router,
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": name, "email": email, "password": "secret1" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let root_id = orgdesk::directory::user::authenticate(&state.db, "root@example.com", "secret1")
        .await
        .unwrap()
        .id;
    assign(&state, root_id, hq, 100).await;

    let ann = login(&router, "ann@example.com", "secret1").await;
    let (_, _, body) = send(
        &router,
        Method::POST,
        "/api/access-requests",
        Some(&ann),
        Some(json!({ "reason": "promotion" })),
    )
    .await;
    let request_id = body["data"]["id"].as_i64().unwrap();

    let specialist = role_with_level(&state, 50).await;
    let decision = json!({ "action": "approve", "role_id": specialist, "department_id": hq });
    let uri = format!("/api/access-requests/{}/decision", request_id);

    let (status, _, _) = send(&router, Method::POST, &uri, Some(&ann), Some(decision.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let root = login(&router, "root@example.com", "secret1").await;
    let (status, _, body) = send(&router, Method::POST, &uri, Some(&root), Some(decision.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["request"]["status"], json!("approved"));
    assert_eq!(body["data"]["assignment"]["role_id"], json!(specialist));

    let (status, _, _) = send(&router, Method::POST, &uri, Some(&root), Some(decision)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _, body) = send(&router, Method::GET, "/api/access-requests", Some(&root), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}
