//! Request handlers module
//!
//! Thin controllers: extract, call the core operation with the session user
//! as actor, wrap the result.

pub mod access;
pub mod assignment;
pub mod auth;
pub mod department;
pub mod kpi;
pub mod project;
pub mod role;
pub mod task;
pub mod user;
