//! User administration: principals, roles, membership and account removal.

use std::collections::{BTreeMap, BTreeSet};

use taskhub_core::error::{TaskhubError, TaskhubResult};
use taskhub_core::models::principal::Principal;
use taskhub_core::models::role::Role;
use taskhub_core::models::user::{CreateUser, User};
use taskhub_core::repository::{
    GroupRepository, PaginatedResult, Pagination, TaskRepository, UserRepository,
};
use tracing::{debug, info};
use uuid::Uuid;

use super::{authorize, guard, today};
use crate::error::{AccessError, commit_failure};
use crate::guard as guards;
use crate::policy::{self, Action, Target};
use crate::recorder;
use crate::validation;

/// Outcome of a role assignment or removal.
#[derive(Debug, Clone)]
pub struct RoleChange {
    pub user: User,
    /// `false` when the request left the role set as it was.
    pub changed: bool,
    /// Advisory message, set when the user is left without any role.
    pub warning: Option<&'static str>,
}

/// Group ids gained and lost by a membership replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub added: BTreeSet<Uuid>,
    pub removed: BTreeSet<Uuid>,
}

impl MembershipChange {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

pub struct UserAdminService<U: UserRepository, G: GroupRepository, T: TaskRepository> {
    users: U,
    groups: G,
    tasks: T,
}

impl<U: UserRepository, G: GroupRepository, T: TaskRepository> UserAdminService<U, G, T> {
    pub fn new(users: U, groups: G, tasks: T) -> Self {
        Self {
            users,
            groups,
            tasks,
        }
    }

    /// Load the acting user and freeze their id and role set for the
    /// duration of one request.
    pub async fn resolve_principal(&self, user_id: Uuid) -> TaskhubResult<Principal> {
        let user = self.users.get_by_id(user_id).await?;
        Ok(Principal::from_user(&user))
    }

    pub async fn get_if_visible(&self, principal: &Principal, id: Uuid) -> TaskhubResult<User> {
        authorize(principal, Action::Read, Target::UserAccount(id))?;
        self.users.get_by_id(id).await
    }

    /// Administrators see every account; anyone else only their own.
    pub async fn list_visible(
        &self,
        principal: &Principal,
        pagination: Pagination,
    ) -> TaskhubResult<PaginatedResult<User>> {
        if policy::authorize(principal, Action::Read, Target::Users).is_allowed() {
            return self.users.list(pagination).await;
        }

        let items = match self.users.get_by_id(principal.user_id).await {
            Ok(user) if pagination.offset == 0 && pagination.limit > 0 => vec![user],
            Ok(_) | Err(TaskhubError::NotFound { .. }) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(PaginatedResult {
            total: items.len() as u64,
            items,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    pub async fn create_user(
        &self,
        principal: &Principal,
        input: CreateUser,
    ) -> TaskhubResult<User> {
        authorize(principal, Action::Create, Target::Users)?;
        validation::new_user(&input, today())?;

        match self.users.get_by_email(&input.email).await {
            Ok(_) => return Err(AccessError::invalid("email", "is already registered").into()),
            Err(TaskhubError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let user = self.users.create(input).await?;
        info!(
            user_id = %user.id,
            actor = %principal.user_id,
            roles = ?user.roles,
            "User created"
        );
        Ok(user)
    }

    /// Grant `role`. Granting a role already held changes nothing.
    pub async fn assign_role(
        &self,
        principal: &Principal,
        user_id: Uuid,
        role: Role,
    ) -> TaskhubResult<RoleChange> {
        authorize(principal, Action::Update, Target::UserAccount(user_id))?;
        let user = self.users.get_by_id(user_id).await?;

        if user.has_role(role) {
            debug!(user_id = %user_id, %role, "Role already held");
            return Ok(RoleChange {
                user,
                changed: false,
                warning: None,
            });
        }

        let mut roles = user.roles.clone();
        roles.insert(role);
        let user = self
            .users
            .update_roles(user_id, roles, user.version)
            .await
            .map_err(commit_failure)?;

        info!(user_id = %user_id, actor = %principal.user_id, %role, "Role assigned");
        Ok(RoleChange {
            user,
            changed: true,
            warning: None,
        })
    }

    /// Withdraw `role`, refusing to demote the last Administrator. A user
    /// left with no role at all is reported through `warning`.
    pub async fn remove_role(
        &self,
        principal: &Principal,
        user_id: Uuid,
        role: Role,
    ) -> TaskhubResult<RoleChange> {
        // 1. Load and authorize.
        authorize(principal, Action::Update, Target::UserAccount(user_id))?;
        let user = self.users.get_by_id(user_id).await?;

        if !user.has_role(role) {
            debug!(user_id = %user_id, %role, "Role not held");
            return Ok(RoleChange {
                user,
                changed: false,
                warning: None,
            });
        }

        // 2. Guard.
        let mut roles = user.roles.clone();
        roles.remove(&role);
        let administrators = self.users.count_with_role(Role::Administrator).await?;
        guard(
            principal,
            guards::last_administrator(&user, Some(&roles), administrators),
        )?;
        let warning = guards::role_removal_warning(&roles);

        // 3. Commit.
        let user = self
            .users
            .update_roles(user_id, roles, user.version)
            .await
            .map_err(commit_failure)?;

        info!(
            user_id = %user_id,
            actor = %principal.user_id,
            %role,
            needs_reassignment = warning.is_some(),
            "Role removed"
        );
        Ok(RoleChange {
            user,
            changed: true,
            warning,
        })
    }

    /// Remove an account. Its task assignments are cleared, each with an
    /// `UnassignedFromUser` audit entry, in the same transaction.
    pub async fn delete_user(&self, principal: &Principal, user_id: Uuid) -> TaskhubResult<()> {
        // 1. Load and authorize.
        authorize(principal, Action::Delete, Target::UserAccount(user_id))?;
        let user = self.users.get_by_id(user_id).await?;

        // 2. Guard.
        let administrators = self.users.count_with_role(Role::Administrator).await?;
        guard(
            principal,
            guards::last_administrator(&user, None, administrators),
        )?;

        // 3. Record the assignments about to be cleared.
        let assigned = self.tasks.list_assigned_to(user_id).await?;
        let mut groups = BTreeMap::new();
        let mut entries = Vec::with_capacity(assigned.len());
        for task in &assigned {
            if !groups.contains_key(&task.group_id) {
                let group = self.groups.get_by_id(task.group_id).await?;
                groups.insert(task.group_id, group);
            }
            if let Some(group) = groups.get(&task.group_id) {
                entries.push(recorder::removed_assignee(principal, task, group, &user));
            }
        }

        // 4. Commit.
        self.users
            .delete(user_id, user.version, entries)
            .await
            .map_err(commit_failure)?;

        info!(
            user_id = %user_id,
            actor = %principal.user_id,
            tasks_unassigned = assigned.len(),
            audit_entries = assigned.len(),
            "User deleted"
        );
        Ok(())
    }

    /// Replace the user's memberships with `group_ids`. Every id must
    /// name an existing group.
    pub async fn manage_group_membership(
        &self,
        principal: &Principal,
        user_id: Uuid,
        group_ids: BTreeSet<Uuid>,
    ) -> TaskhubResult<MembershipChange> {
        authorize(principal, Action::Update, Target::UserAccount(user_id))?;
        self.users.get_by_id(user_id).await?;
        for &group_id in &group_ids {
            self.groups.get_by_id(group_id).await?;
        }

        let current = self.groups.group_ids_for_user(user_id).await?;
        let change = MembershipChange {
            added: group_ids.difference(&current).copied().collect(),
            removed: current.difference(&group_ids).copied().collect(),
        };
        if change.is_empty() {
            debug!(user_id = %user_id, "Membership unchanged");
            return Ok(change);
        }

        self.groups
            .replace_user_groups(user_id, group_ids)
            .await
            .map_err(commit_failure)?;

        info!(
            user_id = %user_id,
            actor = %principal.user_id,
            added = ?change.added,
            removed = ?change.removed,
            "Group membership replaced"
        );
        Ok(change)
    }
}
