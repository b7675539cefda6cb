//! Domain models for TaskHub.
//!
//! These are the core types shared across all crates.

pub mod audit;
pub mod group;
pub mod principal;
pub mod role;
pub mod task;
pub mod user;
