//! Task orchestration.

use chrono::Utc;
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::models::task::{CreateTask, Task, UpdateTask};
use taskhub_core::repository::{
    GroupRepository, PaginatedResult, Pagination, TaskRepository, UserRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{authorize, find_user, merge_by_id, today};
use crate::config::PolicyConfig;
use crate::error::commit_failure;
use crate::policy::{self, Action, Target};
use crate::projection;
use crate::recorder;
use crate::validation;

/// Creates, updates, deletes and lists tasks on behalf of a principal.
pub struct TaskService<T: TaskRepository, G: GroupRepository, U: UserRepository> {
    tasks: T,
    groups: G,
    users: U,
    config: PolicyConfig,
}

impl<T: TaskRepository, G: GroupRepository, U: UserRepository> TaskService<T, G, U> {
    pub fn new(tasks: T, groups: G, users: U, config: PolicyConfig) -> Self {
        Self {
            tasks,
            groups,
            users,
            config,
        }
    }

    /// Tasks visible to the principal, newest first. Administrators see
    /// every task; Managers the tasks of groups they manage; Users the
    /// tasks assigned to them.
    pub async fn list_visible(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> TaskhubResult<PaginatedResult<Task>> {
        if principal.is_administrator() {
            return self.tasks.list(pagination).await;
        }

        let mut lists = Vec::new();
        if principal.has_role(Role::Manager) {
            let managed: Vec<Uuid> = self
                .groups
                .list_managed_by(principal.user_id)
                .await?
                .into_iter()
                .map(|g| g.id)
                .collect();
            lists.push(self.tasks.list_by_groups(managed).await?);
        }
        if principal.has_role(Role::User) {
            lists.push(self.tasks.list_assigned_to(principal.user_id).await?);
        }

        let mut visible = merge_by_id(lists, |t| t.id);
        visible.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = visible.len() as u64;
        let items = visible
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        Ok(PaginatedResult {
            items,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    pub async fn get_if_visible(&self, principal: &Principal, id: Uuid) -> TaskhubResult<Task> {
        let task = self.tasks.get_by_id(id).await?;
        let group = self.groups.get_by_id(task.group_id).await?;
        authorize(principal, Action::Read, Target::Task { task: &task, group: &group })?;
        Ok(task)
    }

    pub async fn create(&self, principal: &Principal, input: CreateTask) -> TaskhubResult<Task> {
        // 1. Authorize against the owning group.
        let group = self.groups.get_by_id(input.group_id).await?;
        authorize(principal, Action::Create, Target::GroupTasks(&group))?;

        // 2. Validate fields.
        validation::new_task(&input, today(), self.config.due_date_horizon_months)?;

        // 3. Resolve the assignee, which must exist.
        let assignee = match input.assigned_user_id {
            Some(id) => Some(self.users.get_by_id(id).await?),
            None => None,
        };

        let task = Task {
            id: Uuid::new_v4(),
            title: input.title.trim().to_string(),
            description: input.description,
            status: input.status.unwrap_or_default(),
            priority: input.priority.unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: None,
            due_date: input.due_date,
            group_id: group.id,
            assigned_user_id: input.assigned_user_id,
            created_by_id: principal.user_id,
            version: 1,
        };

        // 4. Record and commit together.
        let entry = recorder::creation(principal, &task, &group, assignee.as_ref());
        let task = self
            .tasks
            .insert(task, vec![entry])
            .await
            .map_err(commit_failure)?;

        info!(
            task_id = %task.id,
            group_id = %task.group_id,
            actor = %principal.user_id,
            audit_entries = 1,
            "Task created"
        );
        Ok(task)
    }

    /// Apply a change-set. Fields the granting role may not write are
    /// dropped; a change-set that leaves the task as it is writes nothing
    /// and returns the task unchanged.
    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: UpdateTask,
    ) -> TaskhubResult<Task> {
        // 1. Load and authorize.
        let current = self.tasks.get_by_id(id).await?;
        let group = self.groups.get_by_id(current.group_id).await?;
        let role = authorize(
            principal,
            Action::Update,
            Target::Task {
                task: &current,
                group: &group,
            },
        )?;

        // 2. Project onto the writable fields of the granting role.
        let projected = projection::project_task_changes(role, changes);
        if !projected.dropped.is_empty() {
            debug!(
                task_id = %id,
                ?role,
                dropped = ?projected.dropped.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
                "Ignored fields outside the writable set"
            );
        }
        let changes = projected.changes;

        // 3. Validate.
        validation::task_changes(
            &current,
            &changes,
            today(),
            self.config.due_date_horizon_months,
        )?;

        let mut next = current.apply(&changes);
        next.title = next.title.trim().to_string();
        if next == current {
            debug!(task_id = %id, "Update changes nothing");
            return Ok(current);
        }

        // 4. A move needs create rights in the destination group.
        let target_group = if next.group_id != current.group_id {
            let destination = self.groups.get_by_id(next.group_id).await?;
            policy::authorize_as(role, principal, Action::Create, Target::GroupTasks(&destination))
                .into_result()?;
            destination
        } else {
            group
        };

        // 5. Resolve the assignee; a newly set one must exist.
        let assignee = if next.assigned_user_id != current.assigned_user_id {
            match next.assigned_user_id {
                Some(user_id) => Some(self.users.get_by_id(user_id).await?),
                None => None,
            }
        } else {
            find_user(&self.users, next.assigned_user_id).await?
        };

        // 6. Record and commit together.
        let entries =
            recorder::update(principal, role, &current, &next, &target_group, assignee.as_ref());
        let audit_entries = entries.len();
        let task = self
            .tasks
            .replace(next, current.version, entries)
            .await
            .map_err(commit_failure)?;

        info!(
            task_id = %task.id,
            actor = %principal.user_id,
            ?role,
            audit_entries,
            "Task updated"
        );
        Ok(task)
    }

    pub async fn delete(&self, principal: &Principal, id: Uuid) -> TaskhubResult<()> {
        let task = self.tasks.get_by_id(id).await?;
        let group = self.groups.get_by_id(task.group_id).await?;
        authorize(principal, Action::Delete, Target::Task { task: &task, group: &group })?;

        let assignee = find_user(&self.users, task.assigned_user_id).await?;
        let entry = recorder::deletion(principal, &task, &group, assignee.as_ref());
        self.tasks
            .delete(id, task.version, entry)
            .await
            .map_err(commit_failure)?;

        info!(task_id = %id, actor = %principal.user_id, audit_entries = 1, "Task deleted");
        Ok(())
    }
}
