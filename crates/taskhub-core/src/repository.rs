//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Every write that changes a
//! versioned row takes the version the caller read and fails with
//! [`TaskhubError::Conflict`](crate::error::TaskhubError::Conflict) if the
//! row moved on in the meantime, or `NotFound` if it is gone. Task
//! writes carry the audit entries describing them; the store persists
//! both in one transaction or neither.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::TaskhubResult;
use crate::models::{
    audit::{AuditAction, AuditLogEntry, CreateAuditLogEntry},
    group::{CreateGroup, Group, UpdateGroup},
    role::Role,
    task::Task,
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub trait UserRepository: Send + Sync {
    /// Insert a user. Used by bootstrap seeding and provisioning; adding
    /// the first Administrator happens here.
    fn create(&self, input: CreateUser) -> impl Future<Output = TaskhubResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TaskhubResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = TaskhubResult<User>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TaskhubResult<PaginatedResult<User>>> + Send;

    /// Number of users currently holding `role`.
    fn count_with_role(&self, role: Role) -> impl Future<Output = TaskhubResult<u64>> + Send;

    /// Replace the role set. The store refuses, as an invariant
    /// violation, a write that would leave no Administrator when at
    /// least one existed before.
    fn update_roles(
        &self,
        id: Uuid,
        roles: BTreeSet<Role>,
        expected_version: u64,
    ) -> impl Future<Output = TaskhubResult<User>> + Send;

    /// Remove a user. Task assignments are cleared (with the given audit
    /// entries written in the same transaction), groups they managed lose
    /// their manager, memberships are dropped. Subject to the same
    /// Administrator invariant as [`update_roles`](Self::update_roles).
    fn delete(
        &self,
        id: Uuid,
        expected_version: u64,
        audit: Vec<CreateAuditLogEntry>,
    ) -> impl Future<Output = TaskhubResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Groups & membership
// ---------------------------------------------------------------------------

pub trait GroupRepository: Send + Sync {
    fn create(&self, input: CreateGroup) -> impl Future<Output = TaskhubResult<Group>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TaskhubResult<Group>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TaskhubResult<PaginatedResult<Group>>> + Send;
    fn list_managed_by(
        &self,
        manager_id: Uuid,
    ) -> impl Future<Output = TaskhubResult<Vec<Group>>> + Send;
    fn list_for_member(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TaskhubResult<Vec<Group>>> + Send;

    /// Apply a change-set. A present `member_ids` replaces the member set.
    fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
        expected_version: u64,
    ) -> impl Future<Output = TaskhubResult<Group>> + Send;

    /// Remove the group, its membership edges and its tasks, writing the
    /// given audit entries first in the same transaction. The store
    /// refuses the delete if any task of the group is still active.
    fn delete(
        &self,
        id: Uuid,
        expected_version: u64,
        audit: Vec<CreateAuditLogEntry>,
    ) -> impl Future<Output = TaskhubResult<()>> + Send;

    fn member_ids(&self, group_id: Uuid)
    -> impl Future<Output = TaskhubResult<BTreeSet<Uuid>>> + Send;
    fn group_ids_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TaskhubResult<BTreeSet<Uuid>>> + Send;

    /// Replace every membership of `user_id` with `group_ids`.
    fn replace_user_groups(
        &self,
        user_id: Uuid,
        group_ids: BTreeSet<Uuid>,
    ) -> impl Future<Output = TaskhubResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub trait TaskRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TaskhubResult<Task>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = TaskhubResult<PaginatedResult<Task>>> + Send;
    fn list_by_groups(
        &self,
        group_ids: Vec<Uuid>,
    ) -> impl Future<Output = TaskhubResult<Vec<Task>>> + Send;
    fn list_assigned_to(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = TaskhubResult<Vec<Task>>> + Send;

    /// Persist a new task (version 1) together with its audit entries.
    fn insert(
        &self,
        task: Task,
        audit: Vec<CreateAuditLogEntry>,
    ) -> impl Future<Output = TaskhubResult<Task>> + Send;

    /// Overwrite the mutable fields of `task` if the stored version still
    /// equals `expected_version`, together with its audit entries.
    fn replace(
        &self,
        task: Task,
        expected_version: u64,
        audit: Vec<CreateAuditLogEntry>,
    ) -> impl Future<Output = TaskhubResult<Task>> + Send;

    /// Write the deletion audit entry, then remove the task.
    fn delete(
        &self,
        id: Uuid,
        expected_version: u64,
        audit: CreateAuditLogEntry,
    ) -> impl Future<Output = TaskhubResult<()>> + Send;
}

// ---------------------------------------------------------------------------
// Audit (append-only; written only through entity transactions)
// ---------------------------------------------------------------------------

/// Query filters for audit log entries. Set filters are combined with AND.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub task_id: Option<Uuid>,
    /// Restrict to entries whose snapshot group is one of these.
    pub group_ids: Option<Vec<Uuid>>,
    /// Restrict to entries whose snapshot assignee is this user.
    pub assigned_user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

pub trait AuditLogRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = TaskhubResult<AuditLogEntry>> + Send;
    /// Newest first.
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = TaskhubResult<PaginatedResult<AuditLogEntry>>> + Send;
}
