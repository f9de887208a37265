//! Entity module - SeaORM entity definitions
//!
//! One module per table

pub mod access_request;
pub mod department;
pub mod monthly_kpi;
pub mod project;
pub mod role;
pub mod task;
pub mod task_assignee;
pub mod task_review;
pub mod user;
pub mod user_assignment;
