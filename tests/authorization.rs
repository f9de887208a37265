mod common;

use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};

use common::*;
use orgdesk::entity::role;
use orgdesk::permission::{
    authorize, can_view_user, ensure_default_roles, get_or_create_role, managed_departments,
    max_role_level, require_role, DEFAULT_ROLES,
};
use orgdesk::AppError;

#[tokio::test]
async fn test_max_role_level_is_highest_assignment() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d1 = create_department(state, "Ops", None).await;
    let d2 = create_department(state, "Sales", None).await;

    let u = create_user(state, "Ann").await;
    assert_eq!(max_role_level(&state.db, u).await.unwrap(), 0);

    assign(state, u, d1, 30).await;
    assign(state, u, d2, 70).await;
    assert_eq!(max_role_level(&state.db, u).await.unwrap(), 70);
}

#[tokio::test]
async fn test_managed_departments_threshold() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d1 = create_department(state, "Ops", None).await;
    let d2 = create_department(state, "Sales", None).await;
    let d3 = create_department(state, "Legal", None).await;

    let u = create_user(state, "Ann").await;
    assign(state, u, d1, 60).await;
    assign(state, u, d2, 50).await;
    assign(state, u, d3, 90).await;

    let managed = managed_departments(&state.db, state.policy(), u).await.unwrap();
    assert_eq!(managed.into_iter().collect::<Vec<_>>(), vec![d1, d3]);
}

#[tokio::test]
async fn test_require_role_and_authorize() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d = create_department(state, "Ops", None).await;
    let specialist = member(state, "Spec", d, 50).await;

    assert!(require_role(&state.db, specialist, 50).await.unwrap());
    assert!(!require_role(&state.db, specialist, 60).await.unwrap());

    let denied = authorize(&state.db, specialist, 60).await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let privilege = authorize(&state.db, specialist, 50).await.unwrap();
    assert_eq!(privilege.max_role_level(), 50);
}

#[tokio::test]
async fn test_privilege_follows_assignment_changes() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d = create_department(state, "Ops", None).await;
    let admin = member(state, "Root", d, 100).await;
    let u = member(state, "Ann", d, 30).await;
    assert!(!require_role(&state.db, u, 60).await.unwrap());

    let lead = role_with_level(state, 60).await;
    orgdesk::directory::user::assign_role(state, admin, u, d, lead)
        .await
        .unwrap();

    // Same department: the assignment is replaced, not duplicated.
    assert!(require_role(&state.db, u, 60).await.unwrap());
    assert_eq!(max_role_level(&state.db, u).await.unwrap(), 60);
}

#[tokio::test]
async fn test_can_view_user() {
    let app = TestApp::new().await;
    let state = &app.state;
    let policy = state.policy();
    let ops = create_department(state, "Ops", None).await;
    let sales = create_department(state, "Sales", None).await;

    let admin = member(state, "Root", sales, 80).await;
    let manager = member(state, "Lead", ops, 60).await;
    let colleague = member(state, "Ann", ops, 10).await;
    let outsider = member(state, "Bob", sales, 10).await;
    let unassigned = create_user(state, "Eve").await;

    assert!(can_view_user(&state.db, policy, manager, colleague).await.unwrap());
    assert!(!can_view_user(&state.db, policy, manager, outsider).await.unwrap());
    assert!(!can_view_user(&state.db, policy, manager, unassigned).await.unwrap());
    assert!(can_view_user(&state.db, policy, admin, unassigned).await.unwrap());
    assert!(can_view_user(&state.db, policy, admin, colleague).await.unwrap());
    assert!(!can_view_user(&state.db, policy, colleague, manager).await.unwrap());
}

#[tokio::test]
async fn test_ensure_default_roles_is_idempotent() {
    let app = TestApp::new().await;
    let state = &app.state;

    ensure_default_roles(&state.db, state.policy()).await.unwrap();
    ensure_default_roles(&state.db, state.policy()).await.unwrap();

    let total = role::Entity::find().count(&state.db).await.unwrap();
    assert_eq!(total as usize, DEFAULT_ROLES.len());

    let fresher = role::Entity::find()
        .filter(role::Column::Name.eq("Fresher"))
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(fresher.len(), 1);
    assert_eq!(fresher[0].level, 30);
}

#[tokio::test]
async fn test_ensure_default_roles_follows_fresher_level() {
    let app = TestApp::new().await;
    let state = &app.state;

    let mut policy = *state.policy();
    policy.fresher_level = 40;
    ensure_default_roles(&state.db, &policy).await.unwrap();

    let fresher = role::Entity::find()
        .filter(role::Column::Name.eq("Fresher"))
        .all(&state.db)
        .await
        .unwrap();
    assert_eq!(fresher.len(), 1);
    assert_eq!(fresher[0].level, 40);
}

#[tokio::test]
async fn test_get_or_create_role_returns_existing_row() {
    let app = TestApp::new().await;
    let state = &app.state;

    let (a, b) = tokio::join!(
        get_or_create_role(&state.db, "Auditor", 40),
        get_or_create_role(&state.db, "Auditor", 40),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.id, b.id);

    // An existing row keeps its level.
    let again = get_or_create_role(&state.db, "Auditor", 99).await.unwrap();
    assert_eq!(again.id, a.id);
    assert_eq!(again.level, 40);
}

#[tokio::test]
async fn test_first_grant_unlocks_role_and_department() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d = create_department(state, "Ops", None).await;
    let a = create_user(state, "Ann").await;

    assert!(!require_role(&state.db, a, 50).await.unwrap());
    assert!(managed_departments(&state.db, state.policy(), a)
        .await
        .unwrap()
        .is_empty());

    assign(state, a, d, 60).await;

    assert!(require_role(&state.db, a, 50).await.unwrap());
    let managed = managed_departments(&state.db, state.policy(), a).await.unwrap();
    assert_eq!(managed.into_iter().collect::<Vec<_>>(), vec![d]);
}
