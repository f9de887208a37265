//! Workflow state machines
//!
//! Each operation takes the acting user explicitly, re-derives the actor's
//! privilege, mutates inside one transaction and notifies after commit.

pub mod access;
pub mod kpi;
pub mod task;
