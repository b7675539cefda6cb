//! Group orchestration: creation, change-sets, and guarded deletion.

use std::collections::BTreeSet;

use taskhub_core::error::TaskhubResult;
use taskhub_core::models::group::{CreateGroup, Group, GroupDeletionSummary, UpdateGroup};
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::repository::{
    GroupRepository, PaginatedResult, Pagination, TaskRepository, UserRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{authorize, find_user, guard, merge_by_id};
use crate::error::commit_failure;
use crate::guard as guards;
use crate::policy::{Action, Target};
use crate::projection;
use crate::recorder;
use crate::validation;

pub struct GroupService<G: GroupRepository, T: TaskRepository, U: UserRepository> {
    groups: G,
    tasks: T,
    users: U,
}

impl<G: GroupRepository, T: TaskRepository, U: UserRepository> GroupService<G, T, U> {
    pub fn new(groups: G, tasks: T, users: U) -> Self {
        Self {
            groups,
            tasks,
            users,
        }
    }

    /// Groups visible to the principal, ordered by name. Managers see the
    /// groups they manage; Users the groups they belong to.
    pub async fn list_visible(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> TaskhubResult<PaginatedResult<Group>> {
        if principal.is_administrator() {
            return self.groups.list(pagination).await;
        }

        let mut lists = Vec::new();
        if principal.has_role(Role::Manager) {
            lists.push(self.groups.list_managed_by(principal.user_id).await?);
        }
        if principal.has_role(Role::User) {
            lists.push(self.groups.list_for_member(principal.user_id).await?);
        }

        let mut visible = merge_by_id(lists, |g| g.id);
        visible.sort_by(|a, b| a.name.cmp(&b.name));

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

    pub async fn get_if_visible(&self, principal: &Principal, id: Uuid) -> TaskhubResult<Group> {
        let (group, member_ids) = self.load(id).await?;
        authorize(
            principal,
            Action::Read,
            Target::Group {
                group: &group,
                member_ids: &member_ids,
            },
        )?;
        Ok(group)
    }

    /// Member ids of a group the principal can see.
    pub async fn members_if_visible(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> TaskhubResult<BTreeSet<Uuid>> {
        let (group, member_ids) = self.load(id).await?;
        authorize(
            principal,
            Action::Read,
            Target::Group {
                group: &group,
                member_ids: &member_ids,
            },
        )?;
        Ok(member_ids)
    }

    pub async fn create(
        &self,
        principal: &Principal,
        mut input: CreateGroup,
    ) -> TaskhubResult<Group> {
        input.name = input.name.trim().to_string();
        validation::group_name(&input.name)?;
        validation::group_description(input.description.as_deref())?;

        let role = authorize(principal, Action::Create, Target::Groups)?;
        if role == Role::Manager && input.manager_id != Some(principal.user_id) {
            debug!(
                actor = %principal.user_id,
                requested = ?input.manager_id,
                "Manager-created group is managed by its creator"
            );
            input.manager_id = Some(principal.user_id);
        }

        self.require_users(input.manager_id.iter().chain(&input.member_ids))
            .await?;

        let group = self.groups.create(input).await?;
        info!(
            group_id = %group.id,
            actor = %principal.user_id,
            manager = ?group.manager_id,
            "Group created"
        );
        Ok(group)
    }

    /// Apply a change-set. Fields outside the granting role's writable
    /// set are dropped, as are fields equal to their current value; an
    /// empty remainder writes nothing.
    pub async fn update(
        &self,
        principal: &Principal,
        id: Uuid,
        changes: UpdateGroup,
    ) -> TaskhubResult<Group> {
        // 1. Load and authorize.
        let (group, current_members) = self.load(id).await?;
        let role = authorize(
            principal,
            Action::Update,
            Target::Group {
                group: &group,
                member_ids: &current_members,
            },
        )?;

        // 2. Project.
        let projected = projection::project_group_changes(role, changes);
        if !projected.dropped.is_empty() {
            debug!(
                group_id = %id,
                ?role,
                dropped = ?projected.dropped.iter().map(|f| f.as_str()).collect::<Vec<_>>(),
                "Ignored fields outside the writable set"
            );
        }
        let mut changes = projected.changes;

        // 3. Validate.
        if let Some(name) = changes.name.as_mut() {
            *name = name.trim().to_string();
            validation::group_name(name)?;
        }
        if let Some(description) = &changes.description {
            validation::group_description(description.as_deref())?;
        }

        // 4. Strip fields that already hold the requested value.
        if changes.name.as_ref() == Some(&group.name) {
            changes.name = None;
        }
        if changes.description.as_ref() == Some(&group.description) {
            changes.description = None;
        }
        if changes.manager_id == Some(group.manager_id) {
            changes.manager_id = None;
        }
        if changes.member_ids.as_ref() == Some(&current_members) {
            changes.member_ids = None;
        }
        if changes.is_empty() {
            debug!(group_id = %id, "Update changes nothing");
            return Ok(group);
        }

        let new_manager = changes.manager_id.flatten();
        let new_members = changes.member_ids.clone().unwrap_or_default();
        self.require_users(new_manager.iter().chain(&new_members))
            .await?;

        // 5. Commit.
        let membership = changes.member_ids.as_ref().map(|next| {
            (
                next.difference(&current_members).count(),
                current_members.difference(next).count(),
            )
        });
        let updated = self
            .groups
            .update(id, changes, group.version)
            .await
            .map_err(commit_failure)?;

        match membership {
            Some((added, removed)) => info!(
                group_id = %id,
                actor = %principal.user_id,
                ?role,
                members_added = added,
                members_removed = removed,
                "Group updated"
            ),
            None => info!(group_id = %id, actor = %principal.user_id, ?role, "Group updated"),
        }
        Ok(updated)
    }

    /// Counts describing what deleting the group would remove.
    pub async fn deletion_summary(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> TaskhubResult<GroupDeletionSummary> {
        let (group, member_ids) = self.load(id).await?;
        authorize(
            principal,
            Action::Delete,
            Target::Group {
                group: &group,
                member_ids: &member_ids,
            },
        )?;
        let tasks = self.tasks.list_by_groups(vec![id]).await?;
        Ok(guards::deletion_summary(&tasks, member_ids.len()))
    }

    /// Delete a group with no active tasks. Its closed tasks are removed
    /// with it, each leaving a `Deleted` audit entry.
    pub async fn delete(&self, principal: &Principal, id: Uuid) -> TaskhubResult<()> {
        // 1. Load and authorize.
        let (group, member_ids) = self.load(id).await?;
        authorize(
            principal,
            Action::Delete,
            Target::Group {
                group: &group,
                member_ids: &member_ids,
            },
        )?;

        // 2. Guard.
        let tasks = self.tasks.list_by_groups(vec![id]).await?;
        let summary = guards::deletion_summary(&tasks, member_ids.len());
        guard(principal, guards::active_tasks(&summary))?;

        // 3. Record one entry per task removed.
        let mut entries = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let assignee = find_user(&self.users, task.assigned_user_id).await?;
            entries.push(recorder::deletion(principal, task, &group, assignee.as_ref()));
        }

        // 4. Commit.
        self.groups
            .delete(id, group.version, entries)
            .await
            .map_err(commit_failure)?;
        info!(
            group_id = %id,
            actor = %principal.user_id,
            tasks_removed = summary.total_tasks,
            members = summary.members,
            audit_entries = summary.total_tasks,
            "Group deleted"
        );
        Ok(())
    }

    async fn load(&self, id: Uuid) -> TaskhubResult<(Group, BTreeSet<Uuid>)> {
        let group = self.groups.get_by_id(id).await?;
        let member_ids = self.groups.member_ids(id).await?;
        Ok((group, member_ids))
    }

    async fn require_users(&self, ids: impl Iterator<Item = &Uuid>) -> TaskhubResult<()> {
        for &id in ids {
            self.users.get_by_id(id).await?;
        }
        Ok(())
    }
}
