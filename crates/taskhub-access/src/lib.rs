//! TaskHub Access: the authorization and audit engine.
//!
//! Pure decision modules ([`policy`], [`projection`], [`guard`],
//! [`recorder`], [`validation`]) and the [`service`] orchestrators that
//! run them against the entity store.

pub mod config;
pub mod error;
pub mod guard;
pub mod policy;
pub mod projection;
pub mod recorder;
pub mod service;
pub mod validation;

pub use config::PolicyConfig;
pub use error::AccessError;
pub use policy::{Action, Decision, Target};
pub use service::{
    AuditService, GroupService, MembershipChange, RoleChange, TaskService, UserAdminService,
};
