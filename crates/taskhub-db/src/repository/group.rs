//! SurrealDB implementation of [`GroupRepository`].
//!
//! Membership is stored as `user -> member_of -> group` graph edges.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use taskhub_core::error::TaskhubResult;
use taskhub_core::models::audit::CreateAuditLogEntry;
use taskhub_core::models::group::{CreateGroup, Group, UpdateGroup};
use taskhub_core::repository::{GroupRepository, PaginatedResult, Pagination};
use tracing::debug;
use uuid::Uuid;

use super::{
    ACTIVE_TASKS_MARKER, AuditBatch, CONFLICT_MARKER, CountRow, classify_write_failure,
    missing_record, parse_opt_uuid, parse_uuid, require_record, take_failure,
};
use crate::error::DbError;

/// DB-side row struct that includes the record ID via `meta::id(id)`.
#[derive(Debug, SurrealValue)]
struct GroupRow {
    record_id: String,
    name: String,
    description: Option<String>,
    manager_id: Option<String>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GroupRow {
    fn try_into_group(self) -> Result<Group, DbError> {
        Ok(Group {
            id: parse_uuid(&self.record_id, "group")?,
            name: self.name,
            description: self.description,
            manager_id: parse_opt_uuid(self.manager_id, "manager")?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            version: self.version,
        })
    }
}

fn rows_into_groups(rows: Vec<GroupRow>) -> Result<Vec<Group>, DbError> {
    rows.into_iter().map(GroupRow::try_into_group).collect()
}

fn parse_id_set(values: Vec<String>, what: &str) -> Result<BTreeSet<Uuid>, DbError> {
    values.iter().map(|v| parse_uuid(v, what)).collect()
}

/// `RELATE` statement linking a user to a group.
fn relate(user_id: Uuid, group_id: Uuid) -> String {
    format!("RELATE user:`{user_id}` -> member_of -> group:`{group_id}`;\n")
}

/// `RELATE` statements linking each user to the group. Each user must
/// still exist when the transaction runs.
fn relate_members<'a>(group_id: Uuid, user_ids: impl IntoIterator<Item = &'a Uuid>) -> String {
    user_ids
        .into_iter()
        .map(|&user_id| require_record("user", user_id) + &relate(user_id, group_id))
        .collect()
}

/// SurrealDB implementation of the Group repository.
#[derive(Clone)]
pub struct SurrealGroupRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealGroupRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn id_set(
        &self,
        query: &'static str,
        key: &'static str,
        id: Uuid,
    ) -> TaskhubResult<Vec<String>> {
        let mut result = self
            .db
            .query(query)
            .bind((key, id.to_string()))
            .await
            .map_err(DbError::from)?;
        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids)
    }
}

impl<C: Connection> GroupRepository for SurrealGroupRepository<C> {
    async fn create(&self, input: CreateGroup) -> TaskhubResult<Group> {
        let id = Uuid::new_v4();

        let query = format!(
            "BEGIN TRANSACTION;\n\
             CREATE type::record('group', $id) SET \
                 name = $name, description = $description, \
                 manager_id = $manager_id, version = 1;\n\
             {members}\
             COMMIT TRANSACTION;",
            members = relate_members(id, &input.member_ids),
        );

        let mut response = self
            .db
            .query(query)
            .bind(("id", id.to_string()))
            .bind(("name", input.name))
            .bind(("description", input.description))
            .bind(("manager_id", input.manager_id.map(|m| m.to_string())))
            .await
            .map_err(DbError::from)?;

        if let Some(message) = take_failure(&mut response) {
            return Err(missing_record(&message)
                .unwrap_or(DbError::Transaction(message))
                .into());
        }

        debug!(group_id = %id, members = input.member_ids.len(), "Group created");
        self.get_by_id(id).await
    }

    async fn get_by_id(&self, id: Uuid) -> TaskhubResult<Group> {
        let id_str = id.to_string();

        let mut result = self
            .db
            .query("SELECT meta::id(id) AS record_id, * FROM type::record('group', $id)")
            .bind(("id", id_str.clone()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DbError::not_found("group", id_str))?;
        Ok(row.try_into_group()?)
    }

    async fn list(&self, pagination: Pagination) -> TaskhubResult<PaginatedResult<Group>> {
        let mut count_result = self
            .db
            .query("SELECT count() AS total FROM group GROUP ALL")
            .await
            .map_err(DbError::from)?;
        let count_rows: Vec<CountRow> = count_result.take(0).map_err(DbError::from)?;
        let total = count_rows.first().map(|r| r.total).unwrap_or(0);

        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 ORDER BY name ASC \
                 LIMIT $limit START $offset",
            )
            .bind(("limit", pagination.limit))
            .bind(("offset", pagination.offset))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;

        Ok(PaginatedResult {
            items: rows_into_groups(rows)?,
            total,
            offset: pagination.offset,
            limit: pagination.limit,
        })
    }

    async fn list_managed_by(&self, manager_id: Uuid) -> TaskhubResult<Vec<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE manager_id = $manager_id ORDER BY name ASC",
            )
            .bind(("manager_id", manager_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_groups(rows)?)
    }

    async fn list_for_member(&self, user_id: Uuid) -> TaskhubResult<Vec<Group>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM group \
                 WHERE id IN (\
                     SELECT VALUE out FROM member_of \
                     WHERE in = type::record('user', $user_id)\
                 ) \
                 ORDER BY name ASC",
            )
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<GroupRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows_into_groups(rows)?)
    }

    async fn update(
        &self,
        id: Uuid,
        input: UpdateGroup,
        expected_version: u64,
    ) -> TaskhubResult<Group> {
        let id_str = id.to_string();

        let mut sets = Vec::new();
        if input.name.is_some() {
            sets.push("name = $name");
        }
        if input.description.is_some() {
            sets.push("description = $description");
        }
        if input.manager_id.is_some() {
            sets.push("manager_id = $manager_id");
        }
        sets.push("version = version + 1");
        sets.push("updated_at = time::now()");

        let members = match &input.member_ids {
            Some(member_ids) => format!(
                "DELETE member_of WHERE out = type::record('group', $id);\n{}",
                relate_members(id, member_ids)
            ),
            None => String::new(),
        };

        let query = format!(
            "BEGIN TRANSACTION;\n\
             LET $updated = (UPDATE type::record('group', $id) SET {sets} \
                 WHERE version = $expected RETURN AFTER);\n\
             IF array::len($updated) = 0 {{ THROW '{CONFLICT_MARKER}' }};\n\
             {members}\
             COMMIT TRANSACTION;",
            sets = sets.join(", "),
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("expected", expected_version));

        if let Some(name) = input.name {
            builder = builder.bind(("name", name));
        }
        if let Some(description) = input.description {
            builder = builder.bind(("description", description));
        }
        if let Some(manager_id) = input.manager_id {
            builder = builder.bind(("manager_id", manager_id.map(|m| m.to_string())));
        }

        let mut response = builder.await.map_err(DbError::from)?;
        if let Some(message) = take_failure(&mut response) {
            return Err(
                classify_write_failure(&self.db, "group", &id_str, expected_version, message)
                    .await
                    .into(),
            );
        }

        self.get_by_id(id).await
    }

    async fn delete(
        &self,
        id: Uuid,
        expected_version: u64,
        audit: Vec<CreateAuditLogEntry>,
    ) -> TaskhubResult<()> {
        let id_str = id.to_string();
        let batch = AuditBatch::new(audit);
        let task_count = batch.len() as u64;

        // One audit entry per task; a task added since the caller read the
        // group surfaces as a conflict.
        let query = format!(
            "BEGIN TRANSACTION;\n\
             IF array::len((SELECT VALUE id FROM task WHERE group_id = $id \
                 AND status NOT IN ['Done', 'Cancelled'])) > 0 \
                 {{ THROW '{ACTIVE_TASKS_MARKER}' }};\n\
             IF array::len((SELECT VALUE id FROM task WHERE group_id = $id)) != $task_count \
                 {{ THROW '{CONFLICT_MARKER}' }};\n\
             {audit}\
             DELETE task WHERE group_id = $id;\n\
             DELETE member_of WHERE out = type::record('group', $id);\n\
             LET $deleted = (DELETE type::record('group', $id) \
                 WHERE version = $expected RETURN BEFORE);\n\
             IF array::len($deleted) = 0 {{ THROW '{CONFLICT_MARKER}' }};\n\
             COMMIT TRANSACTION;",
            audit = batch.statements,
        );

        let mut builder = self
            .db
            .query(query)
            .bind(("id", id_str.clone()))
            .bind(("expected", expected_version))
            .bind(("task_count", task_count));
        for binding in batch.bindings {
            builder = builder.bind(binding);
        }

        let mut response = builder.await.map_err(DbError::from)?;
        if let Some(message) = take_failure(&mut response) {
            return Err(
                classify_write_failure(&self.db, "group", &id_str, expected_version, message)
                    .await
                    .into(),
            );
        }

        debug!(group_id = %id, tasks_removed = task_count, "Group deleted");
        Ok(())
    }

    async fn member_ids(&self, group_id: Uuid) -> TaskhubResult<BTreeSet<Uuid>> {
        let ids = self
            .id_set(
                "SELECT VALUE meta::id(in) FROM member_of \
                 WHERE out = type::record('group', $group_id)",
                "group_id",
                group_id,
            )
            .await?;
        Ok(parse_id_set(ids, "member")?)
    }

    async fn group_ids_for_user(&self, user_id: Uuid) -> TaskhubResult<BTreeSet<Uuid>> {
        let ids = self
            .id_set(
                "SELECT VALUE meta::id(out) FROM member_of \
                 WHERE in = type::record('user', $user_id)",
                "user_id",
                user_id,
            )
            .await?;
        Ok(parse_id_set(ids, "group")?)
    }

    async fn replace_user_groups(
        &self,
        user_id: Uuid,
        group_ids: BTreeSet<Uuid>,
    ) -> TaskhubResult<()> {
        let relates: String = group_ids
            .iter()
            .map(|&group_id| require_record("group", group_id) + &relate(user_id, group_id))
            .collect();

        let query = format!(
            "BEGIN TRANSACTION;\n\
             {user}\
             DELETE member_of WHERE in = type::record('user', $user_id);\n\
             {relates}\
             COMMIT TRANSACTION;",
            user = require_record("user", user_id),
        );

        let mut response = self
            .db
            .query(query)
            .bind(("user_id", user_id.to_string()))
            .await
            .map_err(DbError::from)?;

        if let Some(message) = take_failure(&mut response) {
            return Err(missing_record(&message)
                .unwrap_or(DbError::Transaction(message))
                .into());
        }

        debug!(user_id = %user_id, groups = group_ids.len(), "Memberships replaced");
        Ok(())
    }
}
