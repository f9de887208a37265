// tests/common/mod.rs
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::sync::mpsc;

use orgdesk::entity::{department, project, role, task, task_assignee, user, user_assignment};
use orgdesk::notify::{Email, MailError, Mailer};
use orgdesk::permission::{ensure_default_roles, get_or_create_role};
use orgdesk::{db, AppState, Config};

static INIT: Once = Once::new();

pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("orgdesk=debug")
            .with_test_writer()
            .try_init();
    });
}

/// Captures every delivered message
pub struct ChannelMailer(mpsc::UnboundedSender<Email>);

#[async_trait]
impl Mailer for ChannelMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
        let _ = self.0.send(email);
        Ok(())
    }
}

/// Rejects every message
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _email: Email) -> Result<(), MailError> {
        Err(MailError::Send("relay unavailable".to_string()))
    }
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.bcrypt_cost = 4;
    config
}

pub struct TestApp {
    pub state: AppState,
    pub outbox: mpsc::UnboundedReceiver<Email>,
}

impl TestApp {
    pub async fn new() -> Self {
        init_test_env();
        let (tx, outbox) = mpsc::unbounded_channel();
        let state = state_with(Arc::new(ChannelMailer(tx))).await;
        Self { state, outbox }
    }

    /// Next delivered message, `None` after a short wait
    pub async fn next_email(&mut self) -> Option<Email> {
        tokio::time::timeout(Duration::from_millis(500), self.outbox.recv())
            .await
            .ok()
            .flatten()
    }

    pub async fn assert_no_email(&mut self) {
        let email = tokio::time::timeout(Duration::from_millis(100), self.outbox.recv())
            .await
            .ok()
            .flatten();
        assert!(email.is_none(), "unexpected email: {:?}", email);
    }
}

pub async fn state_with(mailer: Arc<dyn Mailer>) -> AppState {
    init_test_env();
    let conn = db::connect("sqlite::memory:").await.unwrap();
    let config = test_config();
    ensure_default_roles(&conn, &config.policy).await.unwrap();
    AppState::new(conn, config, mailer)
}

pub async fn create_department(state: &AppState, name: &str, parent_id: Option<i64>) -> i64 {
    department::ActiveModel {
        name: Set(name.to_string()),
        parent_id: Set(parent_id),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap()
    .id
}

pub async fn create_user(state: &AppState, name: &str) -> i64 {
    user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(format!("{}@example.com", name.to_lowercase())),
        password_hash: Set("not-a-hash".to_string()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap()
    .id
}

/// Id of a role with exactly `level`, created on demand
pub async fn role_with_level(state: &AppState, level: i32) -> i64 {
    let existing = role::Entity::find()
        .filter(role::Column::Level.eq(level))
        .one(&state.db)
        .await
        .unwrap();
    match existing {
        Some(r) => r.id,
        None => get_or_create_role(&state.db, &format!("Level {}", level), level)
            .await
            .unwrap()
            .id,
    }
}

pub async fn assign(state: &AppState, user_id: i64, department_id: i64, level: i32) -> i64 {
    let role_id = role_with_level(state, level).await;
    user_assignment::ActiveModel {
        user_id: Set(user_id),
        role_id: Set(role_id),
        department_id: Set(department_id),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap()
    .id
}

/// A user holding one role at `level` in `department_id`
pub async fn member(state: &AppState, name: &str, department_id: i64, level: i32) -> i64 {
    let id = create_user(state, name).await;
    assign(state, id, department_id, level).await;
    id
}

pub async fn create_project(state: &AppState, department_id: i64) -> i64 {
    project::ActiveModel {
        name: Set("Project".to_string()),
        department_id: Set(department_id),
        creator_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap()
    .id
}

pub async fn create_task(
    state: &AppState,
    project_id: i64,
    name: &str,
    start_date: Option<NaiveDate>,
    manager_id: Option<i64>,
    assignees: &[i64],
) -> i64 {
    let created = task::ActiveModel {
        project_id: Set(project_id),
        name: Set(name.to_string()),
        description: Set(None),
        start_date: Set(start_date),
        end_date: Set(None),
        created_by: Set(None),
        manager_id: Set(manager_id),
        submitted: Set(false),
        ..Default::default()
    }
    .insert(&state.db)
    .await
    .unwrap();
    for &user_id in assignees {
        task_assignee::ActiveModel {
            task_id: Set(created.id),
            user_id: Set(user_id),
            workload_percent: Set(None),
        }
        .insert(&state.db)
        .await
        .unwrap();
    }
    created.id
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn email_of(name: &str) -> String {
    format!("{}@example.com", name.to_lowercase())
}
