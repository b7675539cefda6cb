//! Field projection: narrowing an incoming change-set to the fields the
//! granting role may write. Fields outside the writable set are dropped
//! silently; callers only log them.

use taskhub_core::models::group::UpdateGroup;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::UpdateTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Task,
    Group,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Title,
    Name,
    Description,
    Status,
    Priority,
    DueDate,
    GroupId,
    AssignedUserId,
    ManagerId,
    Members,
}

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Name => "name",
            Field::Description => "description",
            Field::Status => "status",
            Field::Priority => "priority",
            Field::DueDate => "due_date",
            Field::GroupId => "group_id",
            Field::AssignedUserId => "assigned_user_id",
            Field::ManagerId => "manager_id",
            Field::Members => "members",
        }
    }
}

const TASK_FULL: &[Field] = &[
    Field::Title,
    Field::Description,
    Field::Status,
    Field::Priority,
    Field::DueDate,
    Field::GroupId,
    Field::AssignedUserId,
];
const TASK_STATUS_ONLY: &[Field] = &[Field::Status];
const GROUP_ADMIN: &[Field] = &[
    Field::Name,
    Field::Description,
    Field::ManagerId,
    Field::Members,
];
const GROUP_MANAGER: &[Field] = &[Field::Name, Field::Description, Field::Members];

/// Fields `role` may write on an entity of `kind`.
pub fn writable_fields(role: Role, kind: EntityKind) -> &'static [Field] {
    match (kind, role) {
        (EntityKind::Task, Role::Administrator | Role::Manager) => TASK_FULL,
        (EntityKind::Task, Role::User) => TASK_STATUS_ONLY,
        (EntityKind::Group, Role::Administrator) => GROUP_ADMIN,
        (EntityKind::Group, Role::Manager) => GROUP_MANAGER,
        (EntityKind::Group, Role::User) => &[],
    }
}

/// A change-set after projection, plus the fields that were removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projected<T> {
    pub changes: T,
    pub dropped: Vec<Field>,
}

/// Keep `value` if `field` is writable, otherwise record it as dropped.
fn keep<V>(
    value: Option<V>,
    field: Field,
    allowed: &[Field],
    dropped: &mut Vec<Field>,
) -> Option<V> {
    match value {
        Some(v) if allowed.contains(&field) => Some(v),
        Some(_) => {
            dropped.push(field);
            None
        }
        None => None,
    }
}

pub fn project_task_changes(role: Role, changes: UpdateTask) -> Projected<UpdateTask> {
    let allowed = writable_fields(role, EntityKind::Task);
    let mut dropped = Vec::new();

    let changes = UpdateTask {
        title: keep(changes.title, Field::Title, allowed, &mut dropped),
        description: keep(changes.description, Field::Description, allowed, &mut dropped),
        status: keep(changes.status, Field::Status, allowed, &mut dropped),
        priority: keep(changes.priority, Field::Priority, allowed, &mut dropped),
        due_date: keep(changes.due_date, Field::DueDate, allowed, &mut dropped),
        group_id: keep(changes.group_id, Field::GroupId, allowed, &mut dropped),
        assigned_user_id: keep(
            changes.assigned_user_id,
            Field::AssignedUserId,
            allowed,
            &mut dropped,
        ),
    };

    Projected { changes, dropped }
}

pub fn project_group_changes(role: Role, changes: UpdateGroup) -> Projected<UpdateGroup> {
    let allowed = writable_fields(role, EntityKind::Group);
    let mut dropped = Vec::new();

    let changes = UpdateGroup {
        name: keep(changes.name, Field::Name, allowed, &mut dropped),
        description: keep(changes.description, Field::Description, allowed, &mut dropped),
        manager_id: keep(changes.manager_id, Field::ManagerId, allowed, &mut dropped),
        member_ids: keep(changes.member_ids, Field::Members, allowed, &mut dropped),
    };

    Projected { changes, dropped }
}
