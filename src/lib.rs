//! Orgdesk - organisation management service
//!
//! Role-based authorization over departments, an access-request workflow,
//! task submission and review, and monthly KPI records.

pub mod config;
pub mod db;
pub mod directory;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod notify;
pub mod permission;
pub mod routes;
pub mod state;
pub mod validation;
pub mod workflow;

// Re-export commonly used types
pub use config::{Config, Policy};
pub use error::{AppError, AppResult};
pub use state::AppState;
