//! Directory operations: departments, projects and users with their role
//! assignments
//!
//! Every mutating call takes the acting user id and checks privilege against
//! the configured policy before touching any row.

pub mod department;
pub mod project;
pub mod user;
