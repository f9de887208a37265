mod common;

use sea_orm::{EntityTrait, PaginatorTrait};

use common::*;
use orgdesk::entity::{monthly_kpi, task};
use orgdesk::workflow::{kpi, task as workflow};
use orgdesk::AppError;

#[tokio::test]
async fn test_highest_kpi_takes_max_of_period() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d = create_department(state, "Ops", None).await;
    let r1 = member(state, "Lead", d, 60).await;
    let r2 = member(state, "Head", d, 80).await;
    let ann = member(state, "Ann", d, 30).await;

    assert_eq!(kpi::highest_kpi(&state.db, ann, 2024, 3).await.unwrap(), None);

    kpi::record_kpi(state, ann, r1, 2024, 3, 70, "steady").await.unwrap();
    kpi::record_kpi(state, ann, r2, 2024, 3, 85, "strong").await.unwrap();
    kpi::record_kpi(state, ann, r1, 2024, 3, 60, "dip").await.unwrap();
    kpi::record_kpi(state, ann, r1, 2024, 4, 99, "next month").await.unwrap();

    assert_eq!(kpi::highest_kpi(&state.db, ann, 2024, 3).await.unwrap(), Some(85));
    assert_eq!(kpi::highest_kpi(&state.db, ann, 2024, 4).await.unwrap(), Some(99));
    assert_eq!(kpi::highest_kpi(&state.db, ann, 2023, 3).await.unwrap(), None);

    let summary = kpi::summary(&state.db, ann, 2024, 3).await.unwrap();
    assert_eq!(summary.highest, Some(85));
    assert_eq!(summary.records.len(), 3);
    assert_eq!(summary.records[0].reviewer_id, Some(r1));
}

#[tokio::test]
async fn test_record_kpi_checks() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d = create_department(state, "Ops", None).await;
    let lead = member(state, "Lead", d, 60).await;
    let specialist = member(state, "Spec", d, 50).await;
    let ann = member(state, "Ann", d, 30).await;

    let denied = kpi::record_kpi(state, ann, specialist, 2024, 3, 50, "").await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    let bad_score = kpi::record_kpi(state, ann, lead, 2024, 3, 101, "").await;
    assert!(matches!(bad_score, Err(AppError::Validation(_))));

    let bad_month = kpi::record_kpi(state, ann, lead, 2024, 13, 50, "").await;
    assert!(matches!(bad_month, Err(AppError::Validation(_))));

    let missing = kpi::record_kpi(state, 9999, lead, 2024, 3, 50, "").await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let count = monthly_kpi::Entity::find().count(&state.db).await.unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_tasks_in_range_is_inclusive_and_ordered() {
    let app = TestApp::new().await;
    let state = &app.state;
    let d = create_department(state, "Ops", None).await;
    let ann = member(state, "Ann", d, 30).await;
    let bob = member(state, "Bob", d, 30).await;
    let project = create_project(state, d).await;

    let late = create_task(state, project, "late", Some(date(2024, 3, 31)), None, &[ann]).await;
    let early = create_task(state, project, "early", Some(date(2024, 3, 1)), None, &[ann]).await;
    let mid = create_task(state, project, "mid", Some(date(2024, 3, 15)), None, &[ann, bob]).await;
    create_task(state, project, "before", Some(date(2024, 2, 29)), None, &[ann]).await;
    create_task(state, project, "after", Some(date(2024, 4, 1)), None, &[ann]).await;
    create_task(state, project, "undated", None, None, &[ann]).await;
    create_task(state, project, "other", Some(date(2024, 3, 10)), None, &[bob]).await;

    let tasks = kpi::tasks_in_range(&state.db, ann, date(2024, 3, 1), date(2024, 3, 31), false)
        .await
        .unwrap();
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![early, mid, late]);

    workflow::toggle_submission(state, mid, ann).await.unwrap();
    let done = kpi::tasks_in_range(&state.db, ann, date(2024, 3, 1), date(2024, 3, 31), true)
        .await
        .unwrap();
    let ids: Vec<i64> = done.iter().map(|t: &task::Model| t.id).collect();
    assert_eq!(ids, vec![mid]);

    let single_day = kpi::tasks_in_range(&state.db, ann, date(2024, 3, 15), date(2024, 3, 15), false)
        .await
        .unwrap();
    assert_eq!(single_day.len(), 1);
}

#[tokio::test]
async fn test_tasks_in_range_rejects_inverted_range() {
    let app = TestApp::new().await;
    let state = &app.state;
    let ann = create_user(state, "Ann").await;

    let result = kpi::tasks_in_range(&state.db, ann, date(2024, 4, 1), date(2024, 3, 1), false).await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let none = kpi::tasks_in_range(&state.db, ann, date(2024, 3, 1), date(2024, 4, 1), false)
        .await
        .unwrap();
    assert!(none.is_empty());
}
