use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::config::{Config, Policy};
use crate::error::AppResult;
use crate::notify::{Email, Mailer, Notifier};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Application configuration
    pub config: Arc<Config>,
    /// Outgoing notifications
    pub notifier: Notifier,
}

impl AppState {
    /// Create new application state
    pub fn new(db: DatabaseConnection, config: Config, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            notifier: Notifier::new(mailer),
        }
    }

    /// Role level thresholds in force
    pub fn policy(&self) -> &Policy {
        &self.config.policy
    }

    /// Send a notification without waiting for delivery
    pub fn notify(&self, email: Email) {
        self.notifier.dispatch(email);
    }

    /// Send a notice built after commit. A failed recipient lookup skips the
    /// notice; the committed change still stands.
    pub fn notify_resolved(&self, notice: AppResult<Option<Email>>) {
        match notice {
            Ok(Some(email)) => self.notify(email),
            Ok(None) => {}
            Err(e) => tracing::warn!("Skipping notification, recipients unresolved: {}", e),
        }
    }
}
