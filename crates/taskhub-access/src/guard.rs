//! Invariant guards: cross-role checks that can block an otherwise
//! authorized mutation.

use std::collections::BTreeSet;

use taskhub_core::error::TaskhubResult;
use taskhub_core::models::group::GroupDeletionSummary;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::Task;
use taskhub_core::models::user::User;

use crate::error::AccessError;

pub const NEEDS_REASSIGNMENT: &str = "account has no role and needs reassignment";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Pass,
    Block(String),
}

impl GuardVerdict {
    /// Convert into a result, `Block` becoming `InvariantViolation`.
    pub fn into_result(self) -> TaskhubResult<()> {
        match self {
            GuardVerdict::Pass => Ok(()),
            GuardVerdict::Block(reason) => Err(AccessError::Blocked(reason).into()),
        }
    }
}

/// Refuse a change that takes the Administrator role away from `target`
/// when they are the only Administrator left.
///
/// `roles_after` is the role set the user would end up with, or `None`
/// when the account is being deleted. `administrators` is the current
/// number of Administrators.
pub fn last_administrator(
    target: &User,
    roles_after: Option<&BTreeSet<Role>>,
    administrators: u64,
) -> GuardVerdict {
    let loses_admin = target.has_role(Role::Administrator)
        && !roles_after.is_some_and(|roles| roles.contains(&Role::Administrator));

    if loses_admin && administrators <= 1 {
        let what = if roles_after.is_some() {
            "demoted"
        } else {
            "deleted"
        };
        GuardVerdict::Block(format!(
            "{} is the last Administrator and cannot be {what}",
            target.full_name()
        ))
    } else {
        GuardVerdict::Pass
    }
}

/// Counts describing a prospective group deletion.
pub fn deletion_summary(tasks: &[Task], members: usize) -> GroupDeletionSummary {
    let active_tasks = tasks.iter().filter(|t| t.is_active()).count() as u64;
    GroupDeletionSummary {
        active_tasks,
        total_tasks: tasks.len() as u64,
        members: members as u64,
        can_delete: active_tasks == 0,
    }
}

/// Refuse to delete a group that still has active tasks.
pub fn active_tasks(summary: &GroupDeletionSummary) -> GuardVerdict {
    if summary.can_delete {
        GuardVerdict::Pass
    } else {
        GuardVerdict::Block(format!(
            "group has {} active task(s) out of {} and {} member(s); \
             complete or cancel them first",
            summary.active_tasks, summary.total_tasks, summary.members
        ))
    }
}

/// Advisory warning when a user is left without any role.
pub fn role_removal_warning(roles_after: &BTreeSet<Role>) -> Option<&'static str> {
    roles_after.is_empty().then_some(NEEDS_REASSIGNMENT)
}
