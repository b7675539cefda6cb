//! Audit recorder: derives the audit entries describing a task event.
//!
//! Every entry carries a by-value snapshot of the task, its group and its
//! assignee as they are at the moment of the event. Entries are returned
//! to the caller, which hands them to the store together with the entity
//! write so both commit or neither does.

use taskhub_core::models::audit::{AuditAction, AuditSnapshot, CreateAuditLogEntry};
use taskhub_core::models::group::Group;
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::Task;
use taskhub_core::models::user::User;

/// Capture `task` with its `group` and `assignee` by value.
pub fn snapshot(task: &Task, group: &Group, assignee: Option<&User>) -> AuditSnapshot {
    AuditSnapshot {
        task_id: task.id,
        task_title: task.title.clone(),
        task_status: task.status,
        task_priority: task.priority,
        group_id: group.id,
        group_name: group.name.clone(),
        assigned_user_id: task.assigned_user_id,
        assigned_user_first_name: assignee.map(|u| u.first_name.clone()),
        assigned_user_last_name: assignee.map(|u| u.last_name.clone()),
    }
}

fn entry(
    actor: &Principal,
    action: AuditAction,
    description: String,
    snapshot: AuditSnapshot,
) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        actor_id: actor.user_id,
        action,
        description,
        snapshot,
    }
}

pub fn creation(
    actor: &Principal,
    task: &Task,
    group: &Group,
    assignee: Option<&User>,
) -> CreateAuditLogEntry {
    let description = match assignee {
        Some(user) => format!("Task created and assigned to {}", user.full_name()),
        None => "Task created (unassigned)".to_string(),
    };
    entry(
        actor,
        AuditAction::Created,
        description,
        snapshot(task, group, assignee),
    )
}

/// Entries for an update from `before` to `after`, one per changed
/// dimension among status, priority and assignee. When none of those
/// changed but another field did, a single `Updated` entry is produced;
/// when nothing changed, none.
///
/// `role` is the role that granted the update. Priority and assignee
/// dimensions are never recorded for a plain User.
pub fn update(
    actor: &Principal,
    role: Role,
    before: &Task,
    after: &Task,
    group: &Group,
    assignee: Option<&User>,
) -> Vec<CreateAuditLogEntry> {
    let shot = snapshot(after, group, assignee);
    let privileged = role != Role::User;
    let mut entries = Vec::new();

    if before.status != after.status {
        entries.push(entry(
            actor,
            AuditAction::StatusChanged,
            format!("Status changed from {} to {}", before.status, after.status),
            shot.clone(),
        ));
    }

    if privileged && before.priority != after.priority {
        entries.push(entry(
            actor,
            AuditAction::PriorityChanged,
            format!(
                "Priority changed from {} to {}",
                before.priority, after.priority
            ),
            shot.clone(),
        ));
    }

    if privileged && before.assigned_user_id != after.assigned_user_id {
        let (action, description) = match assignee {
            Some(user) => (
                AuditAction::AssignedToUser,
                format!("Task assigned to {}", user.full_name()),
            ),
            None => (AuditAction::UnassignedFromUser, "Task unassigned".to_string()),
        };
        entries.push(entry(actor, action, description, shot.clone()));
    }

    let details_changed = before.title != after.title
        || before.description != after.description
        || before.due_date != after.due_date
        || before.group_id != after.group_id;

    if entries.is_empty() && details_changed {
        entries.push(entry(
            actor,
            AuditAction::Updated,
            "Task details updated".to_string(),
            shot,
        ));
    }

    entries
}

/// The entry written before `task` is removed, describing its final state.
pub fn deletion(
    actor: &Principal,
    task: &Task,
    group: &Group,
    assignee: Option<&User>,
) -> CreateAuditLogEntry {
    entry(
        actor,
        AuditAction::Deleted,
        format!("Task '{}' was deleted", task.title),
        snapshot(task, group, assignee),
    )
}

/// The entry for a task whose assignee account is being removed. The
/// snapshot still names the departing assignee.
pub fn removed_assignee(
    actor: &Principal,
    task: &Task,
    group: &Group,
    former: &User,
) -> CreateAuditLogEntry {
    entry(
        actor,
        AuditAction::UnassignedFromUser,
        format!("Task unassigned from {} (account removed)", former.full_name()),
        snapshot(task, group, Some(former)),
    )
}
