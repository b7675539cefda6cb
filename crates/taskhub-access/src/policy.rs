//! Access policy: pure decisions over a principal, an action and a
//! snapshot of the target.
//!
//! Roles are evaluated in precedence order (Administrator, Manager,
//! User). The first held role that allows the action grants it and is
//! reported in [`Decision::Allow`], so callers can project fields and
//! record audit entries as that role. When no held role allows, the
//! reason given by the highest-precedence role is returned.

use std::collections::BTreeSet;

use taskhub_core::error::TaskhubResult;
use taskhub_core::models::audit::AuditLogEntry;
use taskhub_core::models::group::Group;
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::Task;
use uuid::Uuid;

use crate::error::AccessError;

pub const NOT_GROUP_MANAGER: &str = "not group manager";
pub const NOT_ASSIGNEE: &str = "task is not assigned to you";
pub const NOT_MEMBER: &str = "not a member of this group";
pub const NO_ROLE: &str = "account has no role assigned";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Read,
    Create,
    Update,
    Delete,
}

/// What an action is aimed at, with the context needed to decide.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// An existing task together with its owning group.
    Task { task: &'a Task, group: &'a Group },
    /// The task collection of a group; `Create` here means creating a
    /// task inside the group.
    GroupTasks(&'a Group),
    /// An existing group and its current member ids.
    Group {
        group: &'a Group,
        member_ids: &'a BTreeSet<Uuid>,
    },
    /// The group collection; `Create` here means creating a group.
    Groups,
    /// A user account.
    UserAccount(Uuid),
    /// The user collection; `Create` here means provisioning a user.
    Users,
    /// An audit entry and its group, if that group still exists.
    AuditEntry {
        entry: &'a AuditLogEntry,
        group: Option<&'a Group>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Allowed; carries the role that granted the action.
    Allow(Role),
    Deny(String),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    /// Convert into a result, `Deny` becoming `Forbidden`.
    pub fn into_result(self) -> TaskhubResult<Role> {
        match self {
            Decision::Allow(role) => Ok(role),
            Decision::Deny(reason) => Err(AccessError::Denied(reason).into()),
        }
    }
}

/// Decide whether `principal` may perform `action` on `target`.
pub fn authorize(principal: &Principal, action: Action, target: Target<'_>) -> Decision {
    if matches!(target, Target::AuditEntry { .. }) && action != Action::Read {
        return Decision::Deny("audit entries are immutable".into());
    }

    let mut first_reason = None;
    for &role in &principal.roles {
        match decide_as(role, principal.user_id, action, target) {
            Ok(()) => return Decision::Allow(role),
            Err(reason) => {
                first_reason.get_or_insert(reason);
            }
        }
    }
    Decision::Deny(first_reason.unwrap_or_else(|| NO_ROLE.to_string()))
}

/// Decide as a single role, ignoring any other role the principal holds.
pub fn authorize_as(
    role: Role,
    principal: &Principal,
    action: Action,
    target: Target<'_>,
) -> Decision {
    match decide_as(role, principal.user_id, action, target) {
        Ok(()) => Decision::Allow(role),
        Err(reason) => Decision::Deny(reason),
    }
}

fn decide_as(
    role: Role,
    user_id: Uuid,
    action: Action,
    target: Target<'_>,
) -> Result<(), String> {
    match role {
        Role::Administrator => Ok(()),
        Role::Manager => manager_rule(user_id, action, target),
        Role::User => user_rule(user_id, action, target),
    }
}

fn manager_rule(user_id: Uuid, action: Action, target: Target<'_>) -> Result<(), String> {
    let manages = |group: &Group| {
        if group.is_managed_by(user_id) {
            Ok(())
        } else {
            Err(NOT_GROUP_MANAGER.to_string())
        }
    };

    match target {
        Target::Task { group, .. } => manages(group),
        Target::GroupTasks(group) => manages(group),
        Target::Group { group, .. } => match action {
            Action::Create => Err("groups are created through the group collection".into()),
            _ => manages(group),
        },
        Target::Groups => match action {
            Action::Read | Action::Create => Ok(()),
            _ => Err(NOT_GROUP_MANAGER.to_string()),
        },
        Target::UserAccount(id) => own_account(user_id, action, id),
        Target::Users => Err("user management requires Administrator".into()),
        Target::AuditEntry { group, .. } => match group {
            Some(group) => manages(group),
            None => Err(NOT_GROUP_MANAGER.to_string()),
        },
    }
}

fn user_rule(user_id: Uuid, action: Action, target: Target<'_>) -> Result<(), String> {
    match target {
        Target::Task { task, .. } => match action {
            Action::Read | Action::Update if task.assigned_user_id == Some(user_id) => Ok(()),
            Action::Read | Action::Update => Err(NOT_ASSIGNEE.into()),
            Action::Create | Action::Delete => {
                Err("tasks are created and deleted by Administrators and Managers".into())
            }
        },
        Target::GroupTasks(_) => {
            Err("tasks are created and deleted by Administrators and Managers".into())
        }
        Target::Group { member_ids, .. } => match action {
            Action::Read if member_ids.contains(&user_id) => Ok(()),
            Action::Read => Err(NOT_MEMBER.into()),
            _ => Err("group management requires Administrator or Manager".into()),
        },
        Target::Groups => match action {
            Action::Read => Ok(()),
            _ => Err("group management requires Administrator or Manager".into()),
        },
        Target::UserAccount(id) => own_account(user_id, action, id),
        Target::Users => Err("user management requires Administrator".into()),
        Target::AuditEntry { entry, .. } => {
            if entry.snapshot.assigned_user_id == Some(user_id) {
                Ok(())
            } else {
                Err(NOT_ASSIGNEE.into())
            }
        }
    }
}

fn own_account(user_id: Uuid, action: Action, target_id: Uuid) -> Result<(), String> {
    if action == Action::Read && target_id == user_id {
        Ok(())
    } else {
        Err("user management requires Administrator".into())
    }
}
